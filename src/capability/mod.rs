//! 能力层：描述符、注册表与委派适配器

pub mod delegation;
pub mod descriptor;
pub mod registry;

pub use delegation::{delegate, unpack, DELEGATION_PREFIX, INSTRUCTION};
pub use descriptor::{
    str_arg, ArgDoc, Arguments, Capability, CapabilityBuilder, CapabilityDescriptor, Description,
    Invocation, Param, ParamKind, StructuredDescription, IMPLICIT_PARAMS,
};
pub use registry::CapabilitySet;
