//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TemplateFixture::new().with_file("a.yaml", templates::CONTROLLER);
//!     fixture.command().args(["merge", "a.yaml"]).assert().success();
//! }
//! ```

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::templates;
    pub use super::TemplateFixture;
}

/// Template snippets shared between tests.
#[allow(dead_code)]
pub mod templates {
    /// A controller server declared through its role.
    pub const CONTROLLER: &str = r#"
Description: Controller
Parameters:
  Flavor:
    Type: String
    Default: m1.large
Resources:
  Controller0:
    Type: OS::Nova::Server
    Metadata:
      OpenStack::Role: Controller
      OpenStack::ImageBuilder::Elements: [keystone]
    Properties:
      flavor: {Ref: Flavor}
      image: overcloud-control
"#;

    /// A second template that references the controller by its old name.
    pub const CONTROLLER_IP: &str = r#"
Description: Controller address
Resources:
  ControllerIp:
    Type: AWS::EC2::EIP
    Properties:
      InstanceId: {Ref: Controller0}
Outputs:
  KeystoneURL:
    Value:
      Fn::GetAtt: [Controller0, PublicIp]
"#;

    /// A template whose Flavor parameter disagrees with `CONTROLLER`.
    pub const CONFLICTING_FLAVOR: &str = r#"
Parameters:
  Flavor:
    Type: String
    Default: m1.small
"#;

    /// A compute node family that can be scaled with `NovaCompute0`.
    pub const COMPUTE: &str = r#"
Description: Compute
Resources:
  NovaCompute0:
    Type: OS::Nova::Server
    Properties:
      user_data: {Ref: NovaCompute0Config}
  NovaCompute0Config:
    Type: OS::Heat::StructuredConfig
    Properties:
      config: {}
  AllNodes:
    Type: OS::Heat::None
    Properties:
      nodes:
        Merge::Map:
          NovaCompute0: {Ref: NovaCompute0}
"#;
}

/// A temporary directory populated with template files.
///
/// ```rust,ignore
/// let fixture = TemplateFixture::new()
///     .with_file("a.yaml", templates::CONTROLLER)
///     .with_file("lib/b.yaml", templates::COMPUTE);
/// ```
pub struct TemplateFixture {
    temp_dir: assert_fs::TempDir,
}

impl TemplateFixture {
    /// Create a new fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A `heat-merge` command running inside the fixture directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("heat-merge");
        cmd.current_dir(self.path());
        cmd.env_remove("HEAT_MERGE_INCLUDED_TEMPLATE_DIR");
        cmd
    }
}

impl Default for TemplateFixture {
    fn default() -> Self {
        Self::new()
    }
}
