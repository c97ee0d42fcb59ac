use std::collections::HashMap;
use crate::interpreter::value::Value;

/// The variable store: a flat mapping from name to value.
///
/// Bracket has no scope chain. A function call clones the closure's
/// snapshot wholesale, and `def` always writes to the environment it is
/// evaluated in, so lookups never recurse anywhere.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Environment {
    variables: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            variables: HashMap::new(),
        }
    }

    /// Binds `name`, overwriting any existing binding.
    pub fn put_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_owned(), value);
    }

    pub fn find_variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn find_variable_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.variables.get_mut(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_find() {
        let mut environment = Environment::new();
        assert!(!environment.has_variable("x"));

        environment.put_variable("x", Value::Number(1));
        assert_eq!(environment.find_variable("x"), Some(&Value::Number(1)));

        // rebinding overwrites
        environment.put_variable("x", Value::String(String::from("two")));
        assert_eq!(environment.find_variable("x"), Some(&Value::String(String::from("two"))));
    }

    #[test]
    fn clones_are_independent() {
        let mut original = Environment::new();
        original.put_variable("x", Value::Number(1));

        let mut copy = original.clone();
        copy.put_variable("x", Value::Number(2));

        assert_eq!(original.find_variable("x"), Some(&Value::Number(1)));
        assert_eq!(copy.find_variable("x"), Some(&Value::Number(2)));
    }
}
