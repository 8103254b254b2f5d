//! Built-in Excel functions

pub mod args;
pub mod criteria;
pub mod date;
pub mod engineering;
pub mod financial;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod solver;
pub mod statistical;
pub mod text;

use crate::oracle::CellOracle;
use crate::resolver::FunctionDescriptor;
use crate::token::FunctionId;
use crate::value::Value;
use ahash::AHashMap;
use gridcalc_core::ErrorKind;
use once_cell::sync::Lazy;

/// Function implementation signature
///
/// Arguments arrive as they were on the stack: references are not yet read,
/// omitted arguments are `Value::Missing`. Functions consult the oracle for
/// cell contents and workbook settings.
pub type FunctionImpl = fn(&[Value], &dyn CellOracle) -> Result<Value, ErrorKind>;

/// Function definition
pub struct FunctionDef {
    pub descriptor: FunctionDescriptor,
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Mark as volatile (recalculates every time)
    pub fn volatile(&mut self) -> &mut Self {
        self.descriptor.volatile = true;
        self
    }

    /// Let error arguments through to the implementation
    pub fn inspects_errors(&mut self) -> &mut Self {
        self.descriptor.propagates_errors = false;
        self
    }
}

/// First dispatch id handed to add-in functions
const ADDIN_ID_BASE: u16 = 0x1000;

/// Function registry
pub struct FunctionRegistry {
    functions: Vec<FunctionDef>,
    by_name: AHashMap<String, usize>,
    by_id: AHashMap<FunctionId, usize>,
    next_addin: u16,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The process-wide registry, built on first use and never mutated afterwards
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: Vec::new(),
            by_name: AHashMap::new(),
            by_id: AHashMap::new(),
            next_addin: ADDIN_ID_BASE,
        };

        math::register(&mut registry);
        statistical::register(&mut registry);
        financial::register(&mut registry);
        date::register(&mut registry);
        engineering::register(&mut registry);
        info::register(&mut registry);
        logical::register(&mut registry);
        lookup::register(&mut registry);
        text::register(&mut registry);

        log::debug!("function registry holds {} functions", registry.len());
        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.by_name
            .get(&name.to_uppercase())
            .map(|&i| &self.functions[i])
    }

    /// Look up a function by dispatch id
    pub fn get_by_id(&self, id: FunctionId) -> Option<&FunctionDef> {
        self.by_id.get(&id).map(|&i| &self.functions[i])
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Every registered function
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.iter()
    }

    /// Register a core function under its BIFF index
    pub fn builtin(
        &mut self,
        name: &'static str,
        id: u16,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> &mut FunctionDef {
        self.register(FunctionDef {
            descriptor: FunctionDescriptor {
                id: FunctionId(id),
                name,
                min_args,
                max_args,
                addin: false,
                volatile: false,
                propagates_errors: true,
            },
            implementation,
        })
    }

    /// Register an add-in function; it gets a private dispatch id
    pub fn addin(
        &mut self,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> &mut FunctionDef {
        let id = self.next_addin;
        self.next_addin += 1;
        self.register(FunctionDef {
            descriptor: FunctionDescriptor {
                id: FunctionId(id),
                name,
                min_args,
                max_args,
                addin: true,
                volatile: false,
                propagates_errors: true,
            },
            implementation,
        })
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) -> &mut FunctionDef {
        let index = self.functions.len();
        self.by_name.insert(def.descriptor.name.to_uppercase(), index);
        self.by_id.insert(def.descriptor.id, index);
        self.functions.push(def);
        &mut self.functions[index]
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    #[test]
    fn test_registry_ids_are_unique() {
        let reg = registry();
        let ids: AHashSet<_> = reg.iter().map(|d| d.descriptor.id).collect();
        assert_eq!(ids.len(), reg.len());
        let names: AHashSet<_> = reg.iter().map(|d| d.descriptor.name).collect();
        assert_eq!(names.len(), reg.len());
    }

    #[test]
    fn test_addins_stay_clear_of_builtin_ids() {
        for def in registry().iter() {
            if def.descriptor.addin {
                assert!(def.descriptor.id.0 >= ADDIN_ID_BASE, "{}", def.descriptor.name);
            } else {
                assert!(def.descriptor.id.0 < 1024, "{}", def.descriptor.name);
                assert_ne!(def.descriptor.id, FunctionId::ADDIN);
            }
        }
    }

    #[test]
    fn test_lookup_both_ways() {
        let sum = registry().get("sum").unwrap();
        assert_eq!(sum.descriptor.id, FunctionId(4));
        let again = registry().get_by_id(FunctionId(4)).unwrap();
        assert_eq!(again.descriptor.name, "SUM");
    }
}
