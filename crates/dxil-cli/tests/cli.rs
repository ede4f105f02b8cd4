#![cfg(not(target_arch = "wasm32"))]

use std::fs;

use assert_cmd::Command;
use dxil_root_signature::{
    serialize, words_to_le_bytes, RootConstants, RootSignatureDesc, RootSignatureFlags,
    RootSignatureVersion, ShaderVisibility,
};
use tempfile::tempdir;

fn tool() -> Command {
    Command::cargo_bin("dxil-tool").unwrap()
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn profile_prints_the_triple() {
    let output = tool()
        .args(["profile", "cs_6_0", "--validator-version", "1.6"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "triple: dxil-unknown-shadermodel6.0-compute\n\
         stage: compute\n\
         shader model: 6.0\n\
         validator: 1.6\n"
    );
}

#[test]
fn invalid_profile_falls_back_with_a_warning() {
    let output = tool().args(["profile", "ps_4_2"]).output().unwrap();
    assert!(output.status.success());
    assert!(stdout_of(&output).starts_with("triple: dxil-unknown-shadermodel\n"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warning: invalid value 'ps_4_2' for '-T'"), "{stderr}");

    let output = tool()
        .args(["profile", "ps_4_2", "--strict"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn root_signature_blob_is_printed() {
    let mut desc = RootSignatureDesc::new(RootSignatureVersion::V1_0);
    desc.flags = RootSignatureFlags::ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT;
    desc.push_constants(
        ShaderVisibility::All,
        RootConstants {
            shader_register: 2,
            register_space: 0,
            num_32bit_values: 4,
        },
    );

    let dir = tempdir().unwrap();
    let path = dir.path().join("root.sig");
    fs::write(&path, words_to_le_bytes(&serialize(&desc))).unwrap();

    let output = tool()
        .arg("root-signature")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output),
        "RootFlags(ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT), \
         RootConstants(num32BitConstants=4, b2, space=0, visibility=SHADER_VISIBILITY_ALL)\n"
    );
}

#[test]
fn truncated_blob_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.sig");
    fs::write(&path, [1u8, 0, 0, 0, 0, 0, 0, 0]).unwrap();

    let output = tool()
        .arg("root-signature")
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("decode root signature"), "{stderr}");
}
