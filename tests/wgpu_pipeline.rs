//! WebGPU pipeline results match the host reference backend
#![cfg(feature = "wgpu")]

mod common;

use common::{create_cpu_client, create_wgpu_client, run_values};
use ordstat::dataset::TEST_VECTOR;
use ordstat::geometry::PaddingPolicy;
use ordstat::kernel::SortKernel;
use ordstat::pipeline::PipelineConfig;
use ordstat::runtime::cpu::CpuRuntime;
use ordstat::runtime::wgpu::WgpuRuntime;
use ordstat::schedule::Stage;

fn sample(len: usize) -> Vec<i32> {
    (0..len as i32).map(|i| (i * 7919 + 13) % 2003 - 1000).collect()
}

#[test]
fn test_wgpu_matches_cpu() {
    let Some(gpu) = create_wgpu_client() else {
        println!("Skipping: no WebGPU adapter");
        return;
    };
    let cpu = create_cpu_client();

    for (len, g) in [(10, 5), (10, 3), (1000, 64), (517, 32), (300, 256)] {
        for padding in [PaddingPolicy::PerReduction, PaddingPolicy::SharedZero] {
            let config = PipelineConfig::default()
                .with_group_size(g)
                .with_padding(padding);
            let values = if len == 10 {
                TEST_VECTOR.to_vec()
            } else {
                sample(len)
            };
            let expected = run_values::<CpuRuntime>(&cpu, config, &values).unwrap();
            let actual = run_values::<WgpuRuntime>(&gpu, config, &values).unwrap();

            let ctx = format!("len={len} g={g} {padding:?}");
            assert_eq!(actual.min, expected.min, "{ctx}");
            assert_eq!(actual.max, expected.max, "{ctx}");
            assert_eq!(actual.sum, expected.sum, "{ctx}");
            assert_eq!(actual.variance_sum, expected.variance_sum, "{ctx}");
            assert_eq!(actual.sorted, expected.sorted, "{ctx}");
            assert_eq!(actual.positional, expected.positional, "{ctx}");
        }
    }
}

#[test]
fn test_wgpu_sort_strategies() {
    let Some(gpu) = create_wgpu_client() else {
        println!("Skipping: no WebGPU adapter");
        return;
    };
    let values = sample(200);
    let mut expected = values.clone();
    expected.sort_unstable();

    for sort in SortKernel::ALL {
        let config = PipelineConfig::default().with_group_size(64).with_sort(sort);
        let r = run_values::<WgpuRuntime>(&gpu, config, &values).unwrap();
        assert_eq!(r.sorted, expected, "{sort}");
    }
}

#[test]
fn test_wgpu_profiles_every_stage() {
    let Some(gpu) = create_wgpu_client() else {
        println!("Skipping: no WebGPU adapter");
        return;
    };
    let config = PipelineConfig::default().with_group_size(5);
    let r = run_values::<WgpuRuntime>(&gpu, config, &TEST_VECTOR).unwrap();
    for stage in Stage::ALL {
        let sample = r.profiling.get(stage).copied().unwrap_or_default();
        assert!(sample.end_ns >= sample.start_ns, "{stage}");
    }
    assert_eq!(
        r.profiling.is_host_clock(),
        !ordstat::runtime::RuntimeClient::supports_timestamps(&gpu)
    );

    let quiet = run_values::<WgpuRuntime>(&gpu, config.with_profiling(false), &TEST_VECTOR).unwrap();
    assert!(quiet.profiling.is_empty());
    assert_eq!(quiet.variance_sum, r.variance_sum);
    assert_eq!(quiet.sorted, r.sorted);
}

#[test]
fn test_wgpu_programs_cached_per_group_size() {
    use ordstat::runtime::RuntimeClient;
    use ordstat::runtime::wgpu::shaders::ENTRY_POINTS;

    let Some(gpu) = create_wgpu_client() else {
        println!("Skipping: no WebGPU adapter");
        return;
    };
    assert!(gpu.programs().program(8).is_none());
    gpu.build_program(8).unwrap();
    gpu.build_program(8).unwrap();

    let program = gpu.programs().program(8).unwrap();
    assert_eq!(program.group_size(), 8);
    for entry in ENTRY_POINTS {
        assert!(program.pipeline(entry).is_some(), "{entry}");
    }
    assert!(program.pipeline("no_such_entry").is_none());
}
