use sluice_ir as ir;
use sluice_utils::{OutputFile, SluiceResult};

/// A backend over the module representation. Backends are stateless;
/// `run` is the composition of validation and emission.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;

    /// Verify the representation is amenable to this backend.
    fn validate(module: &ir::Module) -> SluiceResult<()>;

    /// Lower the module and write it to `file`.
    fn emit(module: &ir::Module, file: &mut OutputFile) -> SluiceResult<()>;

    fn run(&self, module: &ir::Module, mut file: OutputFile) -> SluiceResult<()> {
        Self::validate(module)?;
        Self::emit(module, &mut file)
    }
}
