// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 15 October 2026

use std::{thread::JoinHandle, time::Duration};

use anyhow::bail;
use lynx_core::prelude::*;
use rand::Rng;

/// A session that answers every slot with the first byte of its payload as class index.
struct TestSession<B: FnMut(&[u8]) -> anyhow::Result<()>> {
    config: ModelConfig,
    options: Option<RunOptions>,
    bind: B,
    bound: Vec<Vec<u8>>,
    resets: usize,
    sent: Vec<Vec<Vec<u8>>>,
    runs: usize,
    fail_configure: bool,
    fail_reset: Option<usize>,
    fail_send: Option<usize>,
    fail_resolve: Option<usize>,
}

fn classify(bound: &[Vec<u8>]) -> ResultSet {
    ResultSet::new(
        bound
            .iter()
            .map(|payload| {
                vec![ClassEntry {
                    index: payload[0] as usize,
                    label: format!("class-{}", payload[0]),
                    score: 1.0,
                }]
            })
            .collect(),
    )
}

fn config() -> ModelConfig {
    ModelConfig {
        name: "digits".to_owned(),
        max_batch_size: 8,
        inputs: vec![],
        outputs: vec![],
    }
}

impl<B: FnMut(&[u8]) -> anyhow::Result<()>> TestSession<B> {
    fn new(bind: B) -> Self {
        Self {
            config: config(),
            options: None,
            bind,
            bound: vec![],
            resets: 0,
            sent: vec![],
            runs: 0,
            fail_configure: false,
            fail_reset: None,
            fail_send: None,
            fail_resolve: None,
        }
    }

    fn check_full(&self) -> anyhow::Result<()> {
        let Some(options) = self.options else {
            bail!("run options not set");
        };
        if self.bound.len() != options.batch_size {
            bail!("expected {} inputs, got {}", options.batch_size, self.bound.len());
        }
        if self.fail_send == Some(self.sent.len()) {
            bail!("server unavailable");
        }
        Ok(())
    }
}

impl<B: FnMut(&[u8]) -> anyhow::Result<()>> InferSession for TestSession<B> {
    type Pending = (usize, JoinHandle<ResultSet>);

    fn model_name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn set_run_options(&mut self, options: RunOptions) -> anyhow::Result<()> {
        if self.fail_configure {
            bail!("batch size not supported");
        }
        self.options = Some(options);
        Ok(())
    }

    fn reset_input(&mut self) -> anyhow::Result<()> {
        if self.fail_reset == Some(self.resets) {
            bail!("input buffer lost");
        }
        self.resets += 1;
        self.bound.clear();
        Ok(())
    }

    fn bind_input(&mut self, data: &[u8]) -> anyhow::Result<()> {
        (self.bind)(data)?;
        self.bound.push(data.to_vec());
        Ok(())
    }

    fn run(&mut self) -> anyhow::Result<ResultSet> {
        self.check_full()?;
        self.runs += 1;
        self.sent.push(self.bound.clone());
        Ok(classify(&self.bound))
    }

    fn submit(&mut self) -> anyhow::Result<Self::Pending> {
        self.check_full()?;
        let id = self.sent.len();
        self.sent.push(self.bound.clone());

        // later batches frequently finish before earlier ones
        let result = classify(&self.bound);
        let delay = rand::thread_rng().gen_range(0..25);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(delay));
            result
        });

        Ok((id, handle))
    }

    fn resolve(&mut self, (id, handle): Self::Pending) -> anyhow::Result<ResultSet> {
        if self.fail_resolve == Some(id) {
            bail!("connection reset");
        }
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker panicked"))
    }
}

fn payloads(count: u8) -> Vec<Vec<u8>> {
    (1..=count).map(|idx| vec![idx; 6]).collect()
}

fn top_ones(results: &[ResultSet]) -> Vec<usize> {
    results
        .iter()
        .flat_map(|result| result.slots().map(|classes| classes[0].index))
        .collect()
}

#[test]
fn ten_images_in_batches_of_four() {
    let inputs = payloads(10);
    let options = RunOptions::new(4, 1);
    let mut session = TestSession::new(|_| Ok(()));

    let batches = plan(&inputs, options.batch_size);
    let mode = DispatchMode::for_inputs(inputs.len());
    assert_eq!(mode, DispatchMode::Async);

    let pending = mode.dispatch(&mut session, &batches, options).unwrap();
    assert_eq!(pending.len(), 3);
    assert_eq!(
        pending.iter().map(Pending::batch).collect::<Vec<_>>(),
        [0, 1, 2]
    );

    let results = collect(&mut session, pending).unwrap();
    assert_eq!(session.options, Some(options));
    assert_eq!(session.resets, 3);
    assert!(session.sent.iter().all(|request| request.len() == 4));
    assert_eq!(top_ones(&results), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10]);

    let mut aggregator = Aggregator::new(options, false);
    for result in &results {
        aggregator.aggregate(result, &[], &mut std::io::sink()).unwrap();
    }
    let tally = aggregator.finish();
    assert_eq!(tally.total(), 12);
    assert_eq!(tally.get(10).unwrap().count, 3);
}

#[test]
fn results_follow_submission_order() {
    let inputs = payloads(40);
    let options = RunOptions::new(3, 1);

    for _ in 0..5 {
        let mut session = TestSession::new(|_| Ok(()));
        let batches = plan(&inputs, options.batch_size);
        let pending = AsyncDispatch
            .dispatch(&mut session, &batches, options)
            .unwrap();
        let results = collect(&mut session, pending).unwrap();

        let expected: Vec<usize> = batches
            .iter()
            .flat_map(|batch| batch.payloads().map(|p| p[0] as usize))
            .collect();
        assert_eq!(top_ones(&results), expected);
    }
}

#[test]
fn single_image_runs_synchronously() {
    let inputs = payloads(1);
    let options = RunOptions::new(3, 1);
    let mut session = TestSession::new(|_| Ok(()));

    let batches = plan(&inputs, options.batch_size);
    let mode = DispatchMode::for_inputs(inputs.len());
    assert_eq!(mode, DispatchMode::Sync);

    let pending = mode.dispatch(&mut session, &batches, options).unwrap();
    assert!(matches!(pending[0], Pending::Ready { batch: 0, .. }));
    assert_eq!(session.runs, 1);
    assert_eq!(session.sent, vec![vec![vec![1; 6]; 3]]);

    let results = collect(&mut session, pending).unwrap();
    assert_eq!(top_ones(&results), [1, 1, 1]);
}

#[test]
fn two_images_in_one_batch_still_submit() {
    let inputs = payloads(2);
    let options = RunOptions::new(4, 1);
    let mut session = TestSession::new(|_| Ok(()));

    let batches = plan(&inputs, options.batch_size);
    let pending = DispatchMode::for_inputs(inputs.len())
        .dispatch(&mut session, &batches, options)
        .unwrap();

    assert!(matches!(pending[0], Pending::InFlight { batch: 0, .. }));
    assert_eq!(session.runs, 0);

    let results = collect(&mut session, pending).unwrap();
    assert_eq!(top_ones(&results), [1, 2, 2, 2]);
}

#[test]
fn no_inputs_send_nothing() {
    let inputs: Vec<Vec<u8>> = vec![];
    let options = RunOptions::new(2, 1);
    let mut session = TestSession::new(|_| Ok(()));

    let batches = plan(&inputs, options.batch_size);
    let pending = DispatchMode::for_inputs(inputs.len())
        .dispatch(&mut session, &batches, options)
        .unwrap();
    let results = collect(&mut session, pending).unwrap();

    assert!(results.is_empty());
    assert!(session.sent.is_empty());
}

#[test]
fn bind_failure_names_batch_and_slot() {
    let inputs = payloads(7);
    let options = RunOptions::new(3, 1);
    let mut session = TestSession::new(|data| {
        if data[0] == 5 {
            bail!("buffer rejected");
        }
        Ok(())
    });

    let batches = plan(&inputs, options.batch_size);
    let err = AsyncDispatch
        .dispatch(&mut session, &batches, options)
        .unwrap_err();

    assert!(matches!(err, LynxError::Bind { batch: 1, slot: 1, .. }));
    assert_eq!(session.sent.len(), 1);
}

#[test]
fn resolve_failure_is_fatal() {
    let inputs = payloads(6);
    let options = RunOptions::new(2, 1);
    let mut session = TestSession::new(|_| Ok(()));
    session.fail_resolve = Some(1);

    let batches = plan(&inputs, options.batch_size);
    let pending = AsyncDispatch
        .dispatch(&mut session, &batches, options)
        .unwrap();
    let err = collect(&mut session, pending).unwrap_err();

    assert!(matches!(err, LynxError::Resolve { batch: 1, .. }));
    assert_eq!(
        err.to_string(),
        "failed receiving infer response for batch 1"
    );
}

#[test]
fn submit_failure_stops_dispatch() {
    let inputs = payloads(9);
    let options = RunOptions::new(2, 1);
    let mut session = TestSession::new(|_| Ok(()));
    session.fail_send = Some(2);

    let batches = plan(&inputs, options.batch_size);
    let err = AsyncDispatch
        .dispatch(&mut session, &batches, options)
        .unwrap_err();

    assert!(matches!(err, LynxError::Submit { batch: 2, .. }));
    assert_eq!(err.to_string(), "failed sending infer request for batch 2");
    assert_eq!(session.sent.len(), 2);
    assert_eq!(session.resets, 3);
}

#[test]
fn sync_run_failure_is_a_submit_error() {
    let inputs = payloads(1);
    let options = RunOptions::new(4, 1);
    let mut session = TestSession::new(|_| Ok(()));
    session.fail_send = Some(0);

    let batches = plan(&inputs, options.batch_size);
    let err = DispatchMode::for_inputs(inputs.len())
        .dispatch(&mut session, &batches, options)
        .unwrap_err();

    assert!(matches!(err, LynxError::Submit { batch: 0, .. }));
    assert_eq!(session.runs, 0);
    assert!(session.sent.is_empty());
}

#[test]
fn configure_failure_sends_nothing() {
    let inputs = payloads(3);
    let options = RunOptions::new(2, 5);
    let mut session = TestSession::new(|_| Ok(()));
    session.fail_configure = true;

    let batches = plan(&inputs, options.batch_size);
    for mode in [DispatchMode::Sync, DispatchMode::Async] {
        let err = mode
            .dispatch(&mut session, &batches, options)
            .unwrap_err();

        assert!(matches!(
            err,
            LynxError::Configure {
                batch_size: 2,
                top_k: 5,
                ..
            }
        ));
        assert_eq!(session.resets, 0);
        assert!(session.sent.is_empty());
    }
}

#[test]
fn reset_failure_names_batch() {
    let inputs = payloads(5);
    let options = RunOptions::new(2, 1);
    let mut session = TestSession::new(|_| Ok(()));
    session.fail_reset = Some(1);

    let batches = plan(&inputs, options.batch_size);
    let err = AsyncDispatch
        .dispatch(&mut session, &batches, options)
        .unwrap_err();

    assert!(matches!(err, LynxError::Reset { batch: 1, .. }));
    assert_eq!(err.to_string(), "failed resetting input for batch 1");
    assert_eq!(session.sent.len(), 1);
}
