use std::path::{
    Path,
    PathBuf,
};

use derivative::Derivative;

use crate::{
    access::CallMode,
    binding::BoundCall,
    diagnostics,
    pipeline::Resolved,
    shape::Shape,
    signature::KernelFunction,
};

/// A resolved and compiled call. Everything here only depends on the call
/// signature, so it's shared by all calls with the same signature.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CallData<K> {
    pub signature: String,
    pub module: String,
    pub function: KernelFunction,
    pub call_mode: CallMode,
    pub call_dimensionality: usize,

    /// Buffer extents are part of the signature, so every call with this
    /// signature has this call shape.
    pub call_shape: Shape,

    pub bindings: BoundCall,

    #[derivative(Debug = "ignore")]
    pub source: String,

    pub kernel: K,
}

impl<K> CallData<K> {
    pub fn new(signature: String, resolved: Resolved, kernel: K) -> Self {
        let call_dimensionality = resolved.call_shape.rank();
        Self {
            signature,
            module: resolved.context.module,
            function: resolved.function,
            call_mode: resolved.context.call_mode,
            call_dimensionality,
            call_shape: resolved.call_shape,
            bindings: resolved.bindings,
            source: resolved.source,
            kernel,
        }
    }

    /// Row-major strides of a call shape, as the kernel expects them in
    /// `_call_stride`. A 0-dimensional call has a single stride of 1.
    pub fn call_strides(call_shape: &[usize]) -> Vec<usize> {
        if call_shape.is_empty() {
            return vec![1];
        }

        let mut strides = vec![1; call_shape.len()];
        for axis in (0..call_shape.len() - 1).rev() {
            strides[axis] = strides[axis + 1] * call_shape[axis + 1];
        }
        strides
    }

    /// Number of threads to dispatch for a call shape.
    pub fn thread_count(call_shape: &[usize]) -> usize {
        call_shape.iter().product()
    }

    /// `<module>_<function>[_backwards].slang`
    pub fn dump_file_name(&self) -> String {
        let suffix = match self.call_mode {
            CallMode::Backward => "_backwards",
            _ => "",
        };
        format!("{}_{}{suffix}.slang", self.module, self.function.name())
    }

    /// Writes the generated source into `dir`, prefixed by the bound call
    /// table.
    pub fn dump(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.dump_file_name());
        let contents = format!(
            "/*\n{}\n\n{}\n*/\n\n{}",
            self.signature,
            diagnostics::bound_call_table(&self.bindings),
            self.source
        );
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}
