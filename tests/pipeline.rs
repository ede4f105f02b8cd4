//! End-to-end: resolve a target, expand a shader-like module and ship its root signature.

use dxil_expand::{IntrinsicExpansion, PreservedAnalyses};
use dxil_ir::{run_function, Builder, FunctionType, Intrinsic, Module, ScalarType, Type, Val, Value};
use dxil_profile::{ShaderStage, TargetOptions};
use dxil_root_signature::{
    deserialize, serialize, words_from_le_bytes, words_to_le_bytes, DescriptorRange,
    DescriptorRangeType, RootSignatureDesc, RootSignatureVersion, ShaderVisibility,
};
use pretty_assertions::assert_eq;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// `shade(color, k) = any(pow(clamp(lerp(color, 1, k), 0, 1), 2))`.
fn shader_module() -> Module {
    let v3 = Type::Vector(ScalarType::F32, 3);
    let mut m = Module::new("pixel");
    let shade = m
        .add_function("shade", FunctionType::new(Type::I1, [v3, v3]))
        .unwrap();
    let entry = m.append_block(shade);
    let one = m.const_float(v3, 1.0);
    let zero = m.const_float(v3, 0.0);
    let two = m.const_float(v3, 2.0);

    let color = Value::Arg(shade, 0);
    let k = Value::Arg(shade, 1);
    let mut b = Builder::at_end(&mut m, entry);
    let mixed = b.call_intrinsic(Intrinsic::DxLerp, v3, &[color, one, k]).unwrap();
    let clamped = b
        .call_intrinsic(Intrinsic::DxClamp, v3, &[mixed, zero, one])
        .unwrap();
    let squared = b.call_intrinsic(Intrinsic::Pow, v3, &[clamped, two]).unwrap();
    let lit = b.call_intrinsic(Intrinsic::DxAny, v3, &[squared]).unwrap();
    b.ret(Some(lit));
    m.verify().unwrap();
    m
}

#[test]
fn target_resolution_feeds_the_pipeline() {
    init_tracing();
    let resolved = TargetOptions::default()
        .with_profile("ps_6_0")
        .with_validator_version("1.7")
        .resolve();
    assert!(!resolved.has_diagnostics());
    assert_eq!(resolved.triple, "dxil-unknown-shadermodel6.0-pixel");
    assert_eq!(
        resolved.profile.map(|p| p.stage()),
        Some(ShaderStage::Pixel)
    );
}

#[test]
fn expanded_shader_behaves_like_the_original() {
    init_tracing();
    let original = shader_module();
    let mut expanded = original.clone();
    assert_eq!(
        IntrinsicExpansion.run(&mut expanded),
        Ok(PreservedAnalyses::None)
    );
    expanded.verify().unwrap();

    for name in [
        "llvm.dx.lerp.v3f32",
        "llvm.dx.clamp.v3f32",
        "llvm.pow.v3f32",
        "llvm.dx.any.v3f32",
    ] {
        assert_eq!(expanded.get_function(name), None, "{name} should be gone");
    }

    let v3 = |x: f32, y: f32, z: f32| Val::Vector(vec![Val::f32(x), Val::f32(y), Val::f32(z)]);
    let inputs = [
        (v3(0.0, 0.0, 0.0), v3(0.0, 0.0, 0.0)),
        (v3(0.0, 0.0, 0.0), v3(0.0, 0.5, 0.0)),
        (v3(-4.0, -2.0, -1.0), v3(0.0, 0.0, 0.0)),
        (v3(0.25, 2.0, -3.0), v3(0.5, 0.5, 0.5)),
    ];
    for (color, k) in inputs {
        let args = [color, k];
        assert_eq!(
            run_function(&expanded, "shade", &args),
            run_function(&original, "shade", &args),
        );
    }

    // Running the pass again finds nothing left to do.
    assert_eq!(
        IntrinsicExpansion.run(&mut expanded),
        Ok(PreservedAnalyses::All)
    );
}

#[test]
fn root_signature_survives_the_byte_container() {
    let mut desc = RootSignatureDesc::new(RootSignatureVersion::V1_1);
    desc.push_descriptor_table(
        ShaderVisibility::Pixel,
        [
            DescriptorRange::new(DescriptorRangeType::Srv, 0),
            DescriptorRange::new(DescriptorRangeType::Cbv, 1),
        ],
    );
    desc.validate().unwrap();

    let bytes = words_to_le_bytes(&serialize(&desc));
    let decoded = deserialize(&words_from_le_bytes(&bytes).unwrap()).unwrap();
    assert_eq!(decoded, desc);
}
