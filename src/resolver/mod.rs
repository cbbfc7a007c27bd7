//! Dependency closure.
//!
//! Two graphs are walked here: state descriptors embedding other
//! descriptors, and script modules importing other modules. Both walks are
//! pure functions of their inputs apart from the external introspection
//! process, so independent root sets can be resolved concurrently.

pub mod python;
pub mod sdl;

pub use python::{
    module_name, ExternalIntrospector, IntrospectionOutcome, ModuleIntrospector, ScriptResolver,
};
pub use sdl::{
    load_descriptor_sources, resolve_descriptors, DescriptorClosure, DescriptorSource, SdlFile,
    StateDescriptor, VarDescriptor, VarType,
};
