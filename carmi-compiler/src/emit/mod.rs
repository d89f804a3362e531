//! Envelope emitters (§4.5, §6): two independent back ends sharing one
//! `ProjectionData` contract.

pub mod bytecode;
pub mod template;

pub use bytecode::{decode, emit as emit_bytecode};
pub use template::{TemplateFormat, emit as emit_template};
