use crate::Id;
use std::collections::{HashMap, HashSet};

/// HashMap-based name generator that hands out fresh names for each
/// prefix. Each module owns one so that generated declarations never
/// collide with caller-declared signals.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    name_hash: HashMap<Id, i64>,
    generated_names: HashSet<Id>,
}

impl NameGenerator {
    /// Create a NameGenerator where `names` are already defined so that
    /// this generator will never produce them.
    pub fn with_prev_defined_names(names: HashSet<Id>) -> Self {
        NameGenerator {
            generated_names: names,
            name_hash: HashMap::default(),
        }
    }

    /// Record names that were defined outside this generator.
    pub fn add_names(&mut self, names: impl IntoIterator<Item = Id>) {
        self.generated_names.extend(names)
    }

    /// Returns true iff this name was previously defined or generated.
    pub fn is_taken(&self, name: Id) -> bool {
        self.generated_names.contains(&name)
    }

    /// Returns a new name that starts with `prefix`.
    /// For example:
    /// ```ignore
    /// namegen.gen_name("tap");  // Generates "tap0"
    /// namegen.gen_name("tap");  // Generates "tap1"
    /// ```
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        let mut cur_prefix: Id = prefix.into();
        loop {
            let count = self
                .name_hash
                .entry(cur_prefix)
                .and_modify(|v| *v += 1)
                .or_insert(-1);

            let name = if *count == -1 {
                cur_prefix
            } else {
                Id::from(format!("{}{}", cur_prefix, count))
            };

            if !self.generated_names.contains(&name) {
                self.generated_names.insert(name);
                return name;
            }

            // The name was defined before this generator saw it; use it
            // as the next prefix to probe from.
            cur_prefix = name;
        }
    }
}
