//! Integration tests for the merge pipeline
//!
//! These tests drive `heat_merge::template::merge::merge` through the public
//! library API against in-memory templates.

use heat_merge::config::MergeOptions;
use heat_merge::filesystem::MemoryFS;
use heat_merge::template::merge::{merge, Conflict, MergeOutcome};
use heat_merge::template::scaling::ScaleRule;
use heat_merge::tree::Tree;

fn run(fs: &MemoryFS, templates: &[&str], options: &MergeOptions) -> MergeOutcome {
    merge(templates, options, fs).expect("merge should succeed")
}

fn network_templates() -> MemoryFS {
    MemoryFS::new()
        .with_file(
            "net.yaml",
            r#"
Description: Network
Parameters:
  NetCidr: {Type: String, Default: 10.0.0.0/8}
  Flavor: {Type: String}
Outputs:
  NetId: {Value: {Ref: Net}}
Resources:
  Net: {Type: OS::Neutron::Net}
"#,
        )
        .with_file(
            "server.yaml",
            r#"
Description: Server
Parameters:
  Flavor: {Type: String}
  KeyName: {Type: String}
Outputs:
  ServerIp: {Value: {Fn::GetAtt: [Server0, PublicIp]}}
Resources:
  Server0:
    Type: OS::Nova::Server
    Properties: {flavor: {Ref: Flavor}}
"#,
        )
}

#[test]
fn test_union_is_commutative_without_conflicts() {
    let fs = network_templates();
    let options = MergeOptions::default();

    let forward = run(&fs, &["net.yaml", "server.yaml"], &options);
    let backward = run(&fs, &["server.yaml", "net.yaml"], &options);

    assert!(!forward.has_conflicts());
    assert!(!backward.has_conflicts());
    for section in ["Parameters", "Outputs", "Resources"] {
        assert_eq!(
            forward.document.get(section),
            backward.document.get(section),
            "{} should not depend on template order",
            section
        );
    }
    assert_eq!(
        forward.document.get("Description"),
        Some(&Tree::from("Network,Server"))
    );
    assert_eq!(
        backward.document.get("Description"),
        Some(&Tree::from("Server,Network"))
    );
}

#[test]
fn test_first_definition_wins_every_section() {
    let fs = MemoryFS::new()
        .with_file(
            "a.yaml",
            "Parameters: {P: {Type: String}}\nOutputs: {O: {Value: a}}\nResources: {R: {Type: OS::Heat::None}}",
        )
        .with_file(
            "b.yaml",
            "Parameters: {P: {Type: Number}}\nOutputs: {O: {Value: b}}\nResources: {R: {Type: OS::Heat::RandomString}}",
        );
    let outcome = run(&fs, &["a.yaml", "b.yaml"], &MergeOptions::default());

    assert_eq!(
        outcome.conflicts,
        vec![
            Conflict::Parameter {
                name: "P".to_string(),
                template: "b.yaml".to_string()
            },
            Conflict::Output {
                name: "O".to_string(),
                template: "b.yaml".to_string()
            },
            Conflict::Resource {
                name: "R".to_string(),
                template: "b.yaml".to_string()
            },
        ]
    );
    let expected = Tree::from_yaml_str(
        r#"
HeatTemplateFormatVersion: '2012-12-12'
Description: a.yaml,b.yaml
Parameters: {P: {Type: String}}
Outputs: {O: {Value: a}}
Resources: {R: {Type: OS::Heat::None}}
"#,
    )
    .unwrap();
    assert_eq!(outcome.document, expected);
}

#[test]
fn test_scaling_cardinality() {
    let fs = MemoryFS::new().with_file(
        "a.yaml",
        "Resources: {Foo0Bar: {Type: OS::Heat::None}, Other: {Type: OS::Heat::None}}",
    );
    let mut options = MergeOptions::default();
    options.scaling.insert(ScaleRule::new("Foo0", 3).unwrap());

    let outcome = run(&fs, &["a.yaml"], &options);
    let names: Vec<&String> = outcome
        .document
        .get("Resources")
        .and_then(Tree::as_mapping)
        .unwrap()
        .keys()
        .collect();
    assert_eq!(names, vec!["Foo0Bar", "Foo1Bar", "Foo2Bar", "Other"]);
}

#[test]
fn test_scaled_reference_outside_copy_is_fatal() {
    let fs = MemoryFS::new().with_file(
        "a.yaml",
        "Resources:\n  Ip:\n    Type: AWS::EC2::EIP\n    Properties: {InstanceId: {Ref: Node0}}\n  Node0: {Type: OS::Nova::Server}",
    );
    let mut options = MergeOptions::default();
    options.scaling.insert(ScaleRule::new("Node0", 2).unwrap());

    let err = merge(&["a.yaml"], &options, &fs).unwrap_err();
    assert!(err.to_string().contains("Scaling error for 'Node0'"));
}

#[test]
fn test_include_in_top_level_template() {
    let fs = MemoryFS::new()
        .with_file("params.yaml", "Flavor: {Type: String, Default: {Ref: DefaultFlavor}}")
        .with_file(
            "a.yaml",
            "Parameters:\n  __include__:\n    path: params.yaml\n    params: {DefaultFlavor: m1.small}",
        );
    // FileInclude's directory has no bearing on __include__ paths.
    let options = MergeOptions::default().with_included_template_dir("lib");

    let outcome = run(&fs, &["a.yaml"], &options);
    assert_eq!(
        outcome.document.get("Parameters"),
        Some(&Tree::from_yaml_str("Flavor: {Type: String, Default: m1.small}").unwrap())
    );
}

#[test]
fn test_include_follows_template_directory() {
    let fs = MemoryFS::new()
        .with_file("stack/shared/params.yaml", "Flavor: {Type: String}")
        .with_file("stack/shared/lib/compute.yaml", "Resources: {Node: {Type: OS::Nova::Server}}")
        .with_file(
            "stack/a.yaml",
            "Parameters:\n  __include__: {path: shared/params.yaml}\nResources:\n  Node:\n    Type: FileInclude\n    Path: compute.yaml\n    SubKey: Resources.Node",
        );
    let options = MergeOptions::default().with_included_template_dir("stack/shared/lib");

    let outcome = run(&fs, &["stack/a.yaml"], &options);
    assert!(outcome.document.get("Parameters").unwrap().get("Flavor").is_some());
    assert_eq!(
        outcome.document.get("Resources").unwrap().get("Node"),
        Some(&Tree::from_yaml_str("Type: OS::Nova::Server").unwrap())
    );
}

#[test]
fn test_malformed_template_root() {
    let fs = MemoryFS::new().with_file("a.yaml", "- just\n- a list");
    let err = merge(&["a.yaml"], &MergeOptions::default(), &fs).unwrap_err();
    assert!(err.to_string().contains("root must be a mapping"));
}
