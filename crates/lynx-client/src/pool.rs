// Author: The Lynx Developers
// Copyright © 2026, The Lynx Developers, all rights reserved.
// Created: 16 October 2026

/*!
A fixed set of worker threads that send requests for a session.

The number of requests on the wire at once is bounded by the number of
workers. Anything submitted beyond that waits in the queue.
*/

use crate::{
    transport::{InferRequest, InferResponse, ModelRef, Transport},
    ClientError,
};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::JoinHandle,
};

pub(crate) type Reply = Result<InferResponse, ClientError>;

struct Job {
    model: ModelRef,
    request: InferRequest,
    reply: mpsc::SyncSender<Reply>,
}

pub(crate) struct RequestPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

impl RequestPool {
    pub(crate) fn new(transport: Arc<dyn Transport>, size: usize) -> Result<Self, ClientError> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let closed = Arc::new(AtomicBool::new(false));

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(size),
            closed: closed.clone(),
        };

        for index in 0..size.max(1) {
            let transport = transport.clone();
            let receiver = receiver.clone();
            let closed = closed.clone();

            let worker = std::thread::Builder::new()
                .name(format!("lynx-request-{}", index))
                .spawn(move || work(transport.as_ref(), &receiver, &closed))
                .map_err(ClientError::Spawn)?;
            pool.workers.push(worker);
        }

        log::debug!("started {} request workers", pool.workers.len());
        Ok(pool)
    }

    pub(crate) fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `request` and return the channel its response arrives on.
    pub(crate) fn send(
        &self,
        model: ModelRef,
        request: InferRequest,
    ) -> Result<mpsc::Receiver<Reply>, ClientError> {
        let (reply, response) = mpsc::sync_channel(1);
        self.sender
            .as_ref()
            .ok_or(ClientError::WorkerPanicked)?
            .send(Job {
                model,
                request,
                reply,
            })
            .map_err(|_| ClientError::WorkerPanicked)?;

        Ok(response)
    }
}

impl Drop for RequestPool {
    fn drop(&mut self) {
        // queued requests are abandoned, in-flight ones run to completion
        self.closed.store(true, Ordering::Release);
        self.sender.take();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn work(transport: &dyn Transport, receiver: &Mutex<mpsc::Receiver<Job>>, closed: &AtomicBool) {
    loop {
        let job = match receiver.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => return,
        };

        let Ok(job) = job else {
            return;
        };

        if closed.load(Ordering::Acquire) {
            return;
        }

        // a panicking transport drops the reply, which the receiver sees as a dead worker
        if let Ok(reply) = catch_unwind(AssertUnwindSafe(|| {
            transport.infer(&job.model, &job.request)
        })) {
            let _ = job.reply.send(reply);
        }
    }
}
