//! Function resolver
//!
//! Maps function names to descriptors. The table itself lives in the
//! function registry so names, ids and implementations are declared together.

use crate::error::ParseError;
use crate::functions::registry;
use crate::token::{ArityKind, FunctionCall, FunctionId};

/// What the parser and dispatcher need to know about a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Dispatch key; the BIFF index for built-ins, a private id for add-ins
    pub id: FunctionId,
    /// Upper-case name
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for unlimited
    pub max_args: Option<usize>,
    /// Reached through the add-in indirection (`ExternName` + id 255)
    pub addin: bool,
    /// Must be recalculated every time
    pub volatile: bool,
    /// Whether an error argument short-circuits the call
    pub propagates_errors: bool,
}

impl FunctionDescriptor {
    /// Id carried by call tokens
    pub fn token_id(&self) -> FunctionId {
        if self.addin {
            FunctionId::ADDIN
        } else {
            self.id
        }
    }

    /// Whether the argument count is within bounds
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Call token for `argc` arguments
    pub fn call(&self, argc: usize) -> FunctionCall {
        if self.addin {
            return FunctionCall {
                id: FunctionId::ADDIN,
                arity: argc + 1,
                kind: ArityKind::Variable,
            };
        }
        let kind = if self.max_args == Some(self.min_args) {
            ArityKind::Fixed
        } else {
            ArityKind::Variable
        };
        FunctionCall {
            id: self.id,
            arity: argc,
            kind,
        }
    }
}

/// Look up a function by name, ignoring case and any `_xlfn.` prefix
pub fn lookup_function(name: &str) -> Option<&'static FunctionDescriptor> {
    let trimmed = name.trim();
    let bare = match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("_xlfn.") => &trimmed[6..],
        _ => trimmed,
    };
    registry().get(bare).map(|def| &def.descriptor)
}

/// Look up a function by dispatch id
pub fn descriptor(id: FunctionId) -> Option<&'static FunctionDescriptor> {
    registry().get_by_id(id).map(|def| &def.descriptor)
}

/// Resolve a name or fail with `UnsupportedFunction`
pub fn resolve(name: &str) -> Result<&'static FunctionDescriptor, ParseError> {
    let found = lookup_function(name)
        .ok_or_else(|| ParseError::UnsupportedFunction(name.trim().to_string()))?;
    log::debug!(
        "resolved function {} to id {}{}",
        found.name,
        found.id.0,
        if found.addin { " (add-in)" } else { "" }
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids() {
        assert_eq!(lookup_function("SUM").unwrap().id, FunctionId(4));
        assert_eq!(lookup_function("if").unwrap().id, FunctionId(1));
        assert_eq!(lookup_function("VLookup").unwrap().id, FunctionId(102));
        assert_eq!(lookup_function("IFERROR").unwrap().id, FunctionId(480));
        assert_eq!(lookup_function("_xlfn.COUNTIFS").unwrap().id, FunctionId(481));
        assert!(lookup_function("NOSUCHFUNC").is_none());
    }

    #[test]
    fn test_addin_descriptor() {
        let d = lookup_function("bin2dec").unwrap();
        assert!(d.addin);
        assert_eq!(d.token_id(), FunctionId::ADDIN);
        let call = d.call(1);
        assert_eq!(call.arity, 2);
        assert_eq!(call.kind, ArityKind::Variable);
        assert_eq!(descriptor(d.id).unwrap().name, "BIN2DEC");
    }

    #[test]
    fn test_call_kinds() {
        let abs = lookup_function("ABS").unwrap();
        assert_eq!(abs.call(1).kind, ArityKind::Fixed);
        let sum = lookup_function("SUM").unwrap();
        assert_eq!(sum.call(3).kind, ArityKind::Variable);
        assert_eq!(sum.call(3).arity, 3);
        assert!(sum.accepts(1));
        assert!(!sum.accepts(0));
    }

    #[test]
    fn test_error_inspectors() {
        assert!(!lookup_function("ISERROR").unwrap().propagates_errors);
        assert!(!lookup_function("IFERROR").unwrap().propagates_errors);
        assert!(lookup_function("SUM").unwrap().propagates_errors);
        assert!(lookup_function("RAND").unwrap().volatile);
    }

    #[test]
    fn test_unsupported() {
        assert_eq!(
            resolve("FOO").unwrap_err(),
            ParseError::UnsupportedFunction("FOO".into())
        );
    }
}
