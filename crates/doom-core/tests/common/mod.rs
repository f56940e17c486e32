// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::sync::Arc;

use doom_core::{
    BasicProbe, BubblePolicy, Cell, CellArena, EngineConfig, EngineParts, SequentialEngine,
};

/// Engine settings with a fixed seed and the given bubble policy.
pub fn config(policy: BubblePolicy, required_stable_steps: u64) -> EngineConfig {
    EngineConfig {
        required_stable_steps,
        bubble_policy: policy,
        seed: 0xD00D,
        ..EngineConfig::default()
    }
}

/// Sequential engine plus a handle to its recording probe.
pub fn sequential<C: Cell>(
    arena: CellArena<C>,
    config: &EngineConfig,
) -> (SequentialEngine<C>, Arc<BasicProbe<C>>) {
    let probe = Arc::new(BasicProbe::<C>::new());
    let parts = EngineParts::from_config(config)
        .expect("valid config")
        .with_probe(probe.clone());
    let engine = SequentialEngine::new(arena, parts).expect("engine");
    (engine, probe)
}

pub fn is_ascending<C: Ord>(cells: &[C]) -> bool {
    cells.windows(2).all(|w| w[0] <= w[1])
}

pub fn is_descending<C: Ord>(cells: &[C]) -> bool {
    cells.windows(2).all(|w| w[0] >= w[1])
}
