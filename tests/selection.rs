use anyhow::Result;
use convdispatch::solvers::{ConvAsm5x10u2v2f1, ConvHipImplicitGemmBwdDataV1R1Xdlops};
use convdispatch::{
    CapabilityProbe, DataType, Direction, DispatchError, Dispatcher, FeatureToggles,
    KernelConfiguration, ProblemBuilder, ProblemDescriptor, Solver, SolverRegistry, TensorLayout,
};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};

fn round_up(value: usize, step: usize) -> usize {
    value.div_ceil(step) * step
}

fn scenario_a() -> ProblemBuilder {
    ProblemDescriptor::builder()
        .batch(8)
        .channels(3, 32)
        .input(&[16, 16])
        .filter(&[5, 10])
        .strides(&[2, 2])
        .padding(&[1, 1])
        .layout(TensorLayout::Nchw)
        .direction(Direction::Forward)
}

fn grouped_backward(dtype: DataType) -> Result<ProblemDescriptor> {
    Ok(ProblemDescriptor::builder()
        .batch(2)
        .channels(256, 128)
        .groups(2)
        .input(&[16, 16])
        .filter(&[1, 1])
        .dtype(dtype)
        .direction(Direction::BackwardData)
        .build()?)
}

fn random_problem(rng: &mut fastrand::Rng) -> ProblemDescriptor {
    let dtype = [DataType::F32, DataType::F16, DataType::BF16][rng.usize(..3)];
    let direction = [
        Direction::Forward,
        Direction::BackwardData,
        Direction::BackwardWeights,
    ][rng.usize(..3)];

    if rng.bool() {
        // Shapes around the fixed 5x10 stride-2 kernel.
        let pads = [rng.usize(0..=6), rng.usize(0..=6)];
        let mut input = [rng.usize(1..=40), rng.usize(1..=40)];
        for (axis, filter) in [5usize, 10].into_iter().enumerate() {
            input[axis] = input[axis].max(filter.saturating_sub(2 * pads[axis])).max(1);
        }
        let k = if rng.bool() { 16 * rng.usize(1..=4) } else { rng.usize(1..=64) };
        ProblemDescriptor::builder()
            .batch(rng.usize(1..=8))
            .channels(rng.usize(1..=8), k)
            .input(&input)
            .filter(&[5, if rng.usize(..4) == 0 { 9 } else { 10 }])
            .strides(&[2, if rng.usize(..4) == 0 { 1 } else { 2 }])
            .padding(&pads)
            .dtype(if rng.bool() { DataType::F32 } else { dtype })
            .direction(direction)
            .build()
            .unwrap()
    } else {
        // Shapes around the implicit-GEMM tile sizes.
        let groups = [1, 1, 2][rng.usize(..3)];
        let filter = [1, 3][rng.usize(..2)];
        let extent = [8, 16, 15, 32][rng.usize(..4)];
        ProblemDescriptor::builder()
            .batch([1, 2, 4, 8][rng.usize(..4)])
            .channels(groups * [64, 128, 96][rng.usize(..3)], groups * [32, 64, 40][rng.usize(..3)])
            .groups(groups)
            .input(&[extent, extent])
            .filter(&[filter, filter])
            .padding(&[filter / 2, filter / 2])
            .dtype(dtype)
            .direction(direction)
            .build()
            .unwrap()
    }
}

fn probes() -> Vec<CapabilityProbe> {
    vec![
        CapabilityProbe::for_arch("gfx803"),
        CapabilityProbe::for_arch("gfx900"),
        CapabilityProbe::for_arch("gfx900").with_assembler(false),
        CapabilityProbe::for_arch("gfx906"),
        CapabilityProbe::for_arch("gfx906").with_toggles(FeatureToggles {
            xdlops_emulate: true,
            ..FeatureToggles::default()
        }),
        CapabilityProbe::for_arch("gfx908"),
    ]
}

/// Checks that the launch grid covers exactly the output the descriptor derives.
fn assert_tiling_agrees(solver: &str, problem: &ProblemDescriptor, config: &KernelConfiguration) {
    assert!(config.is_evenly_tiled(), "{solver}: {:?}", config.global_size);
    match solver {
        ConvAsm5x10u2v2f1::NAME => {
            let out_w = problem.out_width();
            let out_h = problem.out_height();
            assert_eq!(config.global_size[0], round_up(out_w, 64));
            let row_tiles = config.global_size[1] / round_up(problem.out_channels() / 2, 8);
            assert_eq!(row_tiles, out_h.div_ceil(4));
            assert_eq!(config.global_size[2], problem.batch());
        }
        ConvHipImplicitGemmBwdDataV1R1Xdlops::NAME => {
            let ho = problem.out_height();
            let wo = problem.out_width();
            assert_eq!(config.params.int("CK_PARAM_PROBLEM_HO"), Some(ho as i64));
            assert_eq!(config.params.int("CK_PARAM_PROBLEM_WO"), Some(wo as i64));
            let gemm_m = problem.in_channels() * problem.filter_height() * problem.filter_width();
            let gemm_n = problem.batch() * ho * wo;
            assert_eq!(config.group_counts()[0], (gemm_m / 128) * (gemm_n / 128));
        }
        other => panic!("unexpected solver {other}"),
    }
}

#[test]
fn scenario_a_forward_5x10_is_planned() -> Result<()> {
    let problem = scenario_a().build()?;
    let probe = CapabilityProbe::for_arch("gfx900");
    let solver = ConvAsm5x10u2v2f1::new();

    assert!(solver.is_applicable(&problem, &probe));

    let dispatcher = Dispatcher::default();
    let plan = dispatcher.plan(&problem, &probe)?;
    assert_eq!(plan.solver, ConvAsm5x10u2v2f1::NAME);

    let config = &plan.configuration;
    let out_w = problem.out_width();
    let out_h = problem.out_height();
    assert_eq!(config.local_size, vec![64, 8, 1]);
    assert_eq!(
        config.global_size,
        vec![round_up(out_w, 64), round_up(out_h, 4) / 4 * round_up(16, 8), 8]
    );
    assert_eq!(config.global_size, vec![64, 32, 8]);
    assert_eq!(config.artifact.file, "conv5x10u2v2f1.s");
    Ok(())
}

#[test]
fn scenario_b_backward_is_rejected() -> Result<()> {
    let probe = CapabilityProbe::for_arch("gfx900");
    for direction in [Direction::BackwardData, Direction::BackwardWeights] {
        let problem = scenario_a().direction(direction).build()?;
        assert!(!ConvAsm5x10u2v2f1::new().is_applicable(&problem, &probe));
        let err = Dispatcher::default().plan(&problem, &probe).unwrap_err();
        assert!(matches!(err, DispatchError::NoSuitableImplementation { .. }));
    }
    Ok(())
}

#[test]
fn scenario_c_output_channels_not_multiple_of_16() -> Result<()> {
    let solver = ConvAsm5x10u2v2f1::new();
    let mut rng = fastrand::Rng::with_seed(0xC0FFEE);
    for _ in 0..200 {
        let pad = [rng.usize(0..=5), rng.usize(0..=5)];
        let problem = scenario_a()
            .batch(rng.usize(1..=16))
            .channels(rng.usize(1..=64), 33)
            .input(&[rng.usize(5..=64), rng.usize(10..=64)])
            .padding(&pad)
            .build()?;
        for probe in probes() {
            assert!(!solver.is_applicable(&problem, &probe));
        }
    }
    Ok(())
}

#[test]
fn scenario_d_grouped_half_precision_selects_grouped_kernel() -> Result<()> {
    let probe = CapabilityProbe::for_arch("gfx908");
    let dispatcher = Dispatcher::default();

    let half = dispatcher.plan(&grouped_backward(DataType::F16)?, &probe)?;
    assert_eq!(half.solver, ConvHipImplicitGemmBwdDataV1R1Xdlops::NAME);
    assert!(half.configuration.artifact.entry.contains("gnchw_gkcyx_gnkhw"));
    assert!(half.configuration.params.contains("CK_PARAM_KPACK_LENGTH"));
    assert!(half.workspace_bytes > 0);

    let full = dispatcher.plan(&grouped_backward(DataType::F32)?, &probe)?;
    assert!(full.configuration.artifact.entry.contains("gnchw_gkcyx_gnkhw"));
    assert!(!full.configuration.params.contains("CK_PARAM_KPACK_LENGTH"));
    assert_eq!(full.workspace_bytes, 0);

    let ungrouped = ProblemBuilder::from(grouped_backward(DataType::F16)?)
        .channels(128, 64)
        .groups(1)
        .build()?;
    let plan = dispatcher.plan(&ungrouped, &probe)?;
    assert!(plan.configuration.artifact.entry.contains("nchw_kcyx_nkhw"));
    assert!(!plan.configuration.artifact.entry.contains("gnchw"));
    Ok(())
}

#[test]
fn minimum_admissible_input_extent() -> Result<()> {
    let probe = CapabilityProbe::for_arch("gfx803");
    let solver = ConvAsm5x10u2v2f1::new();
    for pad in 0..=4usize {
        let min_w = 10 - 2 * pad;
        let at_min = scenario_a()
            .input(&[16, min_w])
            .padding(&[1, pad])
            .build()?;
        assert!(solver.is_applicable(&at_min, &probe), "pad {pad}");

        let below = scenario_a()
            .input(&[16, min_w - 1])
            .padding(&[1, pad])
            .build()?;
        assert!(!solver.is_applicable(&below, &probe), "pad {pad}");
    }
    Ok(())
}

#[test]
fn predicates_are_deterministic() {
    let registry = SolverRegistry::global();
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..300 {
        let problem = random_problem(&mut rng);
        for probe in probes() {
            for solver in registry.solvers() {
                let first = solver.is_applicable(&problem, &probe);
                for _ in 0..3 {
                    assert_eq!(solver.is_applicable(&problem, &probe), first);
                }
            }
        }
    }
}

#[test]
fn applicable_solvers_produce_consistent_configurations() {
    let registry = SolverRegistry::global();
    let mut rng = fastrand::Rng::with_seed(42);
    let mut planned = 0;
    for _ in 0..500 {
        let problem = random_problem(&mut rng);
        for probe in probes() {
            for solver in registry.enumerate_applicable(&problem, &probe) {
                let config = solver.get_solution(&problem, &probe, None);
                assert_tiling_agrees(solver.name(), &problem, &config);
                assert_eq!(config.workspace_bytes, solver.workspace_size(&problem));
                planned += 1;
            }
        }
    }
    assert!(planned > 0, "sweep never produced an applicable problem");
}

#[test]
fn enumeration_matches_independent_predicates() {
    let registry = SolverRegistry::global();
    let mut rng = fastrand::Rng::with_seed(1234);
    for _ in 0..300 {
        let problem = random_problem(&mut rng);
        for probe in probes() {
            let enumerated: Vec<_> = registry
                .enumerate_applicable(&problem, &probe)
                .iter()
                .map(|solver| solver.name())
                .collect();
            let expected: Vec<_> = registry
                .solvers()
                .iter()
                .filter(|solver| solver.is_applicable(&problem, &probe))
                .map(|solver| solver.name())
                .collect();
            assert_eq!(enumerated, expected);
        }
    }
}

#[test]
fn registry_is_shared_across_threads() {
    let mut rng = fastrand::Rng::with_seed(99);
    let problems: Vec<_> = (0..256).map(|_| random_problem(&mut rng)).collect();
    let probe = CapabilityProbe::for_arch("gfx908");

    let parallel: Vec<Vec<&'static str>> = problems
        .par_iter()
        .map(|problem| {
            SolverRegistry::global()
                .enumerate_applicable(problem, &probe)
                .iter()
                .map(|solver| solver.name())
                .collect()
        })
        .collect();
    let sequential: Vec<Vec<&'static str>> = problems
        .iter()
        .map(|problem| {
            SolverRegistry::global()
                .enumerate_applicable(problem, &probe)
                .iter()
                .map(|solver| solver.name())
                .collect()
        })
        .collect();
    assert_eq!(parallel, sequential);
}

#[test]
fn negative_output_geometry_faults_during_selection() {
    let probes = [
        CapabilityProbe::for_arch("gfx803"),
        CapabilityProbe::for_arch("gfx900"),
        CapabilityProbe::for_arch("gfx906"),
        CapabilityProbe::for_arch("gfx908"),
        CapabilityProbe::for_arch("gfx1030"),
    ];
    for direction in [
        Direction::Forward,
        Direction::BackwardData,
        Direction::BackwardWeights,
    ] {
        let problem = ProblemDescriptor::builder()
            .batch(2)
            .channels(128, 64)
            .input(&[2, 2])
            .filter(&[3, 3])
            .direction(direction)
            .build()
            .unwrap();
        for probe in &probes {
            let enumerated = panic::catch_unwind(AssertUnwindSafe(|| {
                SolverRegistry::global().enumerate_applicable(&problem, probe)
            }));
            assert!(enumerated.is_err(), "{direction} on {}", probe.arch());

            let planned = panic::catch_unwind(AssertUnwindSafe(|| {
                Dispatcher::default().plan(&problem, probe)
            }));
            assert!(planned.is_err(), "{direction} on {}", probe.arch());
        }
    }
}

#[test]
fn maximum_admissible_input_extent() -> Result<()> {
    let probe = CapabilityProbe::for_arch("gfx900");
    let solver = ConvAsm5x10u2v2f1::new();

    let widest = scenario_a().input(&[16, 8191]).build()?;
    assert!(solver.is_applicable(&widest, &probe));
    let too_wide = scenario_a().input(&[16, 8192]).build()?;
    assert!(!solver.is_applicable(&too_wide, &probe));

    let tallest = scenario_a().input(&[131_076, 16]).build()?;
    assert!(solver.is_applicable(&tallest, &probe));
    let plan = Dispatcher::default().plan(&tallest, &probe)?;
    assert!(plan.configuration.is_evenly_tiled());
    let too_tall = scenario_a().input(&[131_077, 16]).build()?;
    assert!(!solver.is_applicable(&too_tall, &probe));
    Ok(())
}

#[test]
fn problem_and_probe_arrive_as_json() -> Result<()> {
    let problem: ProblemDescriptor = serde_json::from_str(
        r#"{
            "batch": 8,
            "in_channels": 3,
            "out_channels": 32,
            "input": [16, 16],
            "filter": [5, 10],
            "strides": [2, 2],
            "left_pads": [1, 1],
            "right_pads": [1, 1]
        }"#,
    )?;
    let probe: CapabilityProbe =
        serde_json::from_str(r#"{"arch": "gfx900", "assembler_available": true}"#)?;

    let plan = Dispatcher::default().plan(&problem, &probe)?;
    assert_eq!(plan.solver, ConvAsm5x10u2v2f1::NAME);
    assert!(plan
        .configuration
        .build_options()
        .contains("-Wa,-defsym,ROCM_METADATA_VERSION=3"));
    Ok(())
}
