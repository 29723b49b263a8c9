//! AST → HIR lowering contract (component J): interface only. Translation
//! from a surface-language AST into HIR is hard and lives entirely in an
//! external front end; this core only declares the boundary it expects and
//! consumes the `hir::Module` that crosses it.

use super::Module;
use crate::error::CoreResult;

/// Implemented by the external front end that owns the AST, name
/// resolution, and type checking. The core calls `translate` once per
/// compilation unit and otherwise never touches the AST type.
pub trait Translator {
    /// Front-end AST node type; opaque to this crate.
    type Ast;

    /// Lowers `ast` into `module`, appending namespaces/classes/methods and
    /// their SSA bodies. Returns `CoreError::BadInput` if the front end
    /// refuses to proceed (e.g. it already reported its own diagnostics
    /// and has nothing well-formed to hand off) — the core treats the
    /// reason as opaque and never inspects it further.
    fn translate(&mut self, ast: &Self::Ast, module: &mut Module) -> CoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::hir::TypeLayout;

    struct RefusingTranslator;

    impl Translator for RefusingTranslator {
        type Ast = ();

        fn translate(&mut self, _ast: &(), _module: &mut Module) -> CoreResult<()> {
            Err(CoreError::BadInput("front end reported errors".into()))
        }
    }

    struct OneClassTranslator;

    impl Translator for OneClassTranslator {
        type Ast = ();

        fn translate(&mut self, _ast: &(), module: &mut Module) -> CoreResult<()> {
            let ns = module.add_namespace("root", None);
            module.add_class(ns, "Point", TypeLayout { instance_size: 16, value_size: 16 }, None);
            Ok(())
        }
    }

    #[test]
    fn bad_input_propagates_as_core_error() {
        let mut module = Module::new();
        let err = RefusingTranslator.translate(&(), &mut module).unwrap_err();
        assert!(matches!(err, CoreError::BadInput(_)));
    }

    #[test]
    fn a_translator_can_populate_a_module() {
        let mut module = Module::new();
        OneClassTranslator.translate(&(), &mut module).unwrap();
        assert_eq!(module.classes.len(), 1);
    }
}
