use std::fmt::Debug;

use crate::error::DownstreamCompileError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Turns generated kernel source into something that can be dispatched.
pub trait Compiler {
    type Kernel: Debug + Send + Sync + 'static;

    fn compile(&self, module: &str, entry_point: &str, source: &str) -> Result<Self::Kernel, BoxError>;
}

/// Wraps the compiler's error with the function that failed to compile.
pub fn compile<C: Compiler>(
    compiler: &C,
    module: &str,
    function: &str,
    source: &str,
) -> Result<C::Kernel, DownstreamCompileError> {
    compiler
        .compile(module, "main", source)
        .map_err(|source| {
            DownstreamCompileError {
                function: function.to_owned(),
                source,
            }
        })
}

/// Doesn't compile anything, the kernel is the source itself.
#[derive(Copy, Clone, Debug, Default)]
pub struct SourceCompiler;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelSource {
    pub module: String,
    pub entry_point: String,
    pub source: String,
}

impl Compiler for SourceCompiler {
    type Kernel = KernelSource;

    fn compile(&self, module: &str, entry_point: &str, source: &str) -> Result<Self::Kernel, BoxError> {
        Ok(KernelSource {
            module: module.to_owned(),
            entry_point: entry_point.to_owned(),
            source: source.to_owned(),
        })
    }
}
