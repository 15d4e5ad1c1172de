//! # Heat Template Merge Library
//!
//! This library merges a set of CloudFormation/Heat-style templates into one
//! deployable document. It is used by the `heat-merge` command-line tool but
//! can be driven directly, for example from tests or other tooling.
//!
//! ## Quick Example
//!
//! ```
//! use heat_merge::config::MergeOptions;
//! use heat_merge::filesystem::MemoryFS;
//! use heat_merge::template::merge::merge;
//!
//! let fs = MemoryFS::new()
//!     .with_file(
//!         "controller.yaml",
//!         "Resources:\n  Ctl0:\n    Type: OS::Nova::Server\n    Metadata: {OpenStack::Role: Controller}",
//!     )
//!     .with_file(
//!         "ip.yaml",
//!         "Resources:\n  Ip:\n    Type: AWS::EC2::EIP\n    Properties: {InstanceId: {Ref: Ctl0}}",
//!     );
//!
//! let outcome = merge(&["controller.yaml", "ip.yaml"], &MergeOptions::default(), &fs).unwrap();
//! let yaml = outcome.document.to_yaml_string().unwrap();
//! assert!(yaml.contains("Ref: Controller"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Trees (`tree`)**: The document model. Every template is a tree of
//!   scalars, sequences and string-keyed mappings.
//! - **Template sources (`filesystem`)**: Where templates are loaded from,
//!   either the real disk or an in-memory set of files.
//! - **Template stages (`template`)**: Include expansion, parameter
//!   substitution, the merge itself, scaling, `Merge::Map` expansion and
//!   reference fixing.
//! - **Configuration (`config`)**: Merge options and the manifest file.
//!
//! ## Execution Flow
//!
//! [`template::merge::merge`] runs these steps:
//!
//! 1.  **Load**: Read each template and expand its `__include__` directives.
//! 2.  **Merge**: Union Parameters, Outputs and Resources, folding servers
//!     that share a role into one resource and recording conflicts.
//! 3.  **Scale**: Clone prefixed resource families.
//! 4.  **Expand**: Turn `Merge::Map` macros into sorted lists.
//! 5.  **Fix references**: Point references at renamed resources.

pub mod config;
pub mod error;
pub mod filesystem;
pub mod template;
pub mod tree;

#[cfg(test)]
mod template_proptest;
