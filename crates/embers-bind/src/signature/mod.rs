//! The two trees a call is resolved from: the host arguments and the
//! kernel's reflected parameters.

pub mod host;
pub mod kernel;

pub use self::{
    host::{
        HostCall,
        HostNode,
    },
    kernel::{
        KernelFunction,
        KernelNode,
        RESULT_NAME,
    },
};
