#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
#[cfg(not(target_arch = "wasm32"))]
use dxil_root_signature::{
    deserialize, serialize, DescriptorRange, DescriptorRangeType, RootConstants, RootDescriptor,
    RootDescriptorFlags, RootDescriptorKind, RootSignatureDesc, RootSignatureVersion,
    ShaderVisibility, StaticSamplerDesc,
};

#[cfg(not(target_arch = "wasm32"))]
fn signature(tables: u32) -> RootSignatureDesc {
    let mut desc = RootSignatureDesc::new(RootSignatureVersion::V1_1);
    desc.push_constants(
        ShaderVisibility::All,
        RootConstants {
            shader_register: 0,
            register_space: 0,
            num_32bit_values: 4,
        },
    );
    desc.push_descriptor(
        ShaderVisibility::Vertex,
        RootDescriptor {
            kind: RootDescriptorKind::Cbv,
            shader_register: 1,
            register_space: 0,
            flags: Some(RootDescriptorFlags::DATA_STATIC),
        },
    );
    for i in 0..tables {
        desc.push_descriptor_table(
            ShaderVisibility::Pixel,
            [
                DescriptorRange::new(DescriptorRangeType::Srv, i * 4),
                DescriptorRange::new(DescriptorRangeType::Uav, i),
            ],
        );
    }
    for i in 0..4 {
        desc.static_samplers.push(StaticSamplerDesc {
            shader_register: i,
            ..StaticSamplerDesc::default()
        });
    }
    desc
}

#[cfg(not(target_arch = "wasm32"))]
fn bench_root_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("root_signature");

    for tables in [1u32, 16, 64] {
        let desc = signature(tables);
        let words = serialize(&desc);

        group.bench_with_input(BenchmarkId::new("serialize", tables), &desc, |b, desc| {
            b.iter(|| black_box(serialize(black_box(desc))).len())
        });
        group.bench_with_input(BenchmarkId::new("deserialize", tables), &words, |b, words| {
            b.iter(|| {
                let desc = deserialize(black_box(words)).unwrap();
                black_box(desc.parameters.len());
            })
        });
    }

    group.finish();
}

#[cfg(not(target_arch = "wasm32"))]
criterion_group!(benches, bench_root_signature);
#[cfg(not(target_arch = "wasm32"))]
criterion_main!(benches);
