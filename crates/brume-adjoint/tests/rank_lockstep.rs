//! Integration test: recording lockstep across communicator ranks.
//!
//! Every rank must open each recording scope with the same kind under
//! the same tape generation. Two in-process ranks agreeing complete
//! their recordings; a rank requesting a different kind, or carrying a
//! tape of a different generation, makes the agreement collective fail
//! on every rank at once rather than deadlocking or diverging.

use std::thread;

use brume_adjoint::Recorder;
use brume_core::{
    CommError, ConvergenceTable, DomainKey, InstanceId, IterationClock, ModuleKind, RecordingKind,
    TimeMarching, ZoneId,
};
use brume_domain::ChannelComm;
use brume_driver::{FluidController, SolveError};
use brume_physics::{MeshState, SolveContext, ZoneSet};
use brume_test_utils::SyntheticModule;

// ── Helpers ──────────────────────────────────────────────────────────

const POINTS: usize = 4;

fn rank_zone() -> ZoneSet {
    let module =
        SyntheticModule::new(ModuleKind::Flow, POINTS, TimeMarching::Steady).with_adjoint();
    ZoneSet::new(
        DomainKey::new(ZoneId(0), InstanceId(0)),
        vec![module.boxed()],
        MeshState::new(POINTS, TimeMarching::Steady, false),
    )
    .unwrap()
}

/// Run one rank: record `kinds` in order, with `extra_reset` bumping
/// the tape generation before the last recording. Returns the per-call
/// results.
fn run_rank(
    comm: ChannelComm,
    kinds: Vec<RecordingKind>,
    extra_reset: bool,
) -> Vec<Result<(), SolveError>> {
    let mut zone = rank_zone();
    let mut primal = FluidController::new(-8.0);
    let mut table = ConvergenceTable::new();
    let mut clock = IterationClock::new(0.1);
    let mut ctx = SolveContext::new(&comm, &mut table, &mut clock, TimeMarching::Steady, false);

    let mut recorder = Recorder::new();
    let last = kinds.len() - 1;
    kinds
        .into_iter()
        .enumerate()
        .map(|(index, kind)| {
            if extra_reset && index == last {
                recorder.tape_mut().reset();
            }
            recorder
                .record(kind, None, &mut primal, &mut zone, &mut ctx)
                .map(|_| ())
        })
        .collect()
}

fn run_pair(
    rank0: Vec<RecordingKind>,
    rank1: Vec<RecordingKind>,
    extra_reset_on_rank1: bool,
) -> (Vec<Result<(), SolveError>>, Vec<Result<(), SolveError>>) {
    let mut comms = ChannelComm::mesh(2).into_iter();
    let comm0 = comms.next().unwrap();
    let comm1 = comms.next().unwrap();

    let first = thread::spawn(move || run_rank(comm0, rank0, false));
    let second = thread::spawn(move || run_rank(comm1, rank1, extra_reset_on_rank1));
    (first.join().unwrap(), second.join().unwrap())
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn agreeing_ranks_complete_their_recordings() {
    let kinds = vec![
        RecordingKind::SolutionVariables,
        RecordingKind::MeshCoords,
        RecordingKind::SolutionVariables,
    ];
    let (rank0, rank1) = run_pair(kinds.clone(), kinds, false);

    assert!(rank0.iter().all(Result::is_ok));
    assert!(rank1.iter().all(Result::is_ok));
}

#[test]
fn divergent_kind_fails_on_every_rank() {
    let (rank0, rank1) = run_pair(
        vec![
            RecordingKind::SolutionVariables,
            RecordingKind::SolutionVariables,
        ],
        vec![
            RecordingKind::SolutionVariables,
            RecordingKind::MeshCoords,
        ],
        false,
    );

    assert!(rank0[0].is_ok());
    assert!(rank1[0].is_ok());
    for result in [&rank0[1], &rank1[1]] {
        match result {
            Err(SolveError::Comm(CommError::Desync { .. })) => {}
            other => panic!("expected Desync, got {other:?}"),
        }
    }
}

#[test]
fn divergent_tape_generation_fails_on_every_rank() {
    // Same kind everywhere; rank 1 resets its tape once more, so the
    // generations disagree at the second recording.
    let kinds = vec![
        RecordingKind::SolutionVariables,
        RecordingKind::SolutionVariables,
    ];
    let (rank0, rank1) = run_pair(kinds.clone(), kinds, true);

    assert!(rank0[0].is_ok());
    assert!(rank1[0].is_ok());
    for result in [&rank0[1], &rank1[1]] {
        match result {
            Err(SolveError::Comm(CommError::Desync { .. })) => {}
            other => panic!("expected Desync, got {other:?}"),
        }
    }
}
