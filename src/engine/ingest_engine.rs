use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::BufReader;
use std::mem;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{spawn_blocking, JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::config::IngestConfig;
use crate::engine::{RunFailure, RunLaunchError};
use crate::models::{ParseError, TransactionRecord};
use crate::pipeline::{
    Chunk, ChunkProcessor, ChunkReport, Deduplicator, PipelineError, RecordParser, RunSummary, SkipListener,
    SkipPolicy, SkipTracker, StageError
};
use crate::storage::TransactionStore;
use crate::types::RunId;

type ReadItem = Result<TransactionRecord, ParseError>;
type ChunkResult = Result<ChunkReport, PipelineError>;

/// What a launched run produced, including a partial summary when it stopped early.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub summary: RunSummary,
    pub failure: Option<RunFailure>
}

/// Chunked, concurrent ingestion of one delimited file into a [`TransactionStore`].
///
/// A blocking reader task parses lines and feeds a bounded channel. The dispatcher groups parsed
/// records into chunks and hands each chunk to a blocking worker, with at most
/// `concurrency` chunks in flight.
pub struct IngestEngine<S: TransactionStore> {
    store: Arc<S>,
    config: IngestConfig,
    listener: Arc<dyn SkipListener>
}

impl<S: TransactionStore> IngestEngine<S> {
    pub fn new(store: Arc<S>, config: IngestConfig) -> Self {
        Self {
            store,
            config,
            listener: Arc::new(SkipTracker::new())
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SkipListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Runs the pipeline over the configured input file.
    ///
    /// Per-line and per-record failures never surface here; they go to the skip listener.
    pub async fn run(&self, run_id: RunId) -> Result<RunReport, RunLaunchError> {
        self.config.validate()?;

        let path = &self.config.input_path;
        let file = File::open(path).map_err(|source| RunLaunchError::InputUnavailable {
            path: path.clone(),
            source
        })?;

        info!("Run [{run_id}] reading [{}] in chunks of [{}] with [{}] workers", path.display(), self.config.chunk_size, self.config.concurrency);

        let policy = Arc::new(SkipPolicy::new(self.config.skip_limit));
        let (sender, receiver) = mpsc::channel::<ReadItem>(self.config.channel_capacity);
        let reader_handle = self.spawn_reader(file, sender);
        let mut report = self.dispatch_chunks(run_id, receiver, policy).await;

        match reader_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                error!("Run [{run_id}] input read failed: {error}");
                report.failure.get_or_insert(RunFailure::Input(error.to_string()));
            }
            Err(error) => {
                error!("Run [{run_id}] reader task failed: {error}");
                report.failure.get_or_insert(RunFailure::Worker(error.to_string()));
            }
        }

        Ok(report)
    }

    fn spawn_reader(&self, file: File, sender: mpsc::Sender<ReadItem>) -> JoinHandle<Result<(), csv::Error>> {
        let parser = RecordParser::new(self.config.delimiter);
        let delimiter = self.config.delimiter;
        let lines_to_skip = self.config.lines_to_skip as u64;

        spawn_blocking(move || {
            let mut reader = ReaderBuilder::new()
                .delimiter(delimiter)
                .has_headers(false)
                .flexible(true)
                .quoting(false)
                .trim(Trim::All)
                .from_reader(BufReader::new(file));

            for result in reader.records() {
                let item = match result {
                    Ok(record) => {
                        let line_number = record.position().map_or(0, |position| position.line());

                        if line_number <= lines_to_skip {
                            continue;
                        }

                        parser.parse_record(&record, line_number)
                    }
                    Err(error) if error.is_io_error() => return Err(error),
                    Err(error) => {
                        let line_number = error.position().map_or(0, |position| position.line());

                        if line_number > 0 && line_number <= lines_to_skip {
                            continue;
                        }

                        Err(ParseError::Unreadable { line_number, reason: error.to_string() })
                    }
                };

                //NOTE: A closed channel means the dispatcher stopped early, so there is no one left to read for
                if sender.blocking_send(item).is_err() {
                    break;
                }
            }

            Ok(())
        })
    }

    async fn dispatch_chunks(&self, run_id: RunId, mut receiver: mpsc::Receiver<ReadItem>, policy: Arc<SkipPolicy>) -> RunReport {
        let deduplicator = Arc::new(Deduplicator::new(self.store.clone()));
        let processor = Arc::new(ChunkProcessor::new(
            self.store.clone(),
            deduplicator,
            self.listener.clone(),
            policy.clone()
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut workers = JoinSet::new();
        let mut summary = RunSummary::default();
        let mut failure = None;
        let mut chunk = Vec::with_capacity(self.config.chunk_size);
        let mut sequence = 0;

        while let Some(item) = receiver.recv().await {
            match item {
                Ok(record) => chunk.push(record),
                Err(error) => {
                    self.listener.on_skip_in_read(&error);
                    summary.read_skips += 1;

                    if let Err(error) = policy.admit_skip(StageError::Parse(&error)) {
                        failure = Some(RunFailure::Pipeline(error));
                        break;
                    }
                }
            }

            if chunk.len() >= self.config.chunk_size {
                let records = mem::replace(&mut chunk, Vec::with_capacity(self.config.chunk_size));
                sequence += 1;

                if let Err(error) = self.dispatch(&semaphore, &processor, &mut workers, Chunk { sequence, records }).await {
                    failure = Some(error);
                    break;
                }
            }

            while let Some(joined) = workers.try_join_next() {
                absorb(joined, &mut summary, &mut failure);
            }

            if failure.is_some() {
                break;
            }
        }

        //NOTE: Dropping the receiver unblocks and stops the reader when we leave the loop early
        drop(receiver);

        if failure.is_none() && !chunk.is_empty() {
            sequence += 1;

            if let Err(error) = self.dispatch(&semaphore, &processor, &mut workers, Chunk { sequence, records: chunk }).await {
                failure = Some(error);
            }
        }

        while let Some(joined) = workers.join_next().await {
            absorb(joined, &mut summary, &mut failure);
        }

        debug!("Run [{run_id}] dispatched [{sequence}] chunks");

        RunReport { run_id, summary, failure }
    }

    async fn dispatch(
        &self,
        semaphore: &Arc<Semaphore>,
        processor: &Arc<ChunkProcessor<S>>,
        workers: &mut JoinSet<ChunkResult>,
        chunk: Chunk
    ) -> Result<(), RunFailure> {
        //NOTE: Waiting for a permit here is what bounds the number of chunks in flight
        let permit = semaphore.clone().acquire_owned().await
            .map_err(|error| RunFailure::Worker(error.to_string()))?;
        let processor = processor.clone();

        workers.spawn_blocking(move || {
            let _permit = permit;
            processor.process(chunk)
        });

        Ok(())
    }
}

fn absorb(joined: Result<ChunkResult, JoinError>, summary: &mut RunSummary, failure: &mut Option<RunFailure>) {
    match joined {
        Ok(Ok(report)) => summary.absorb(&report),
        Ok(Err(error)) => {
            error!("Chunk failed: {error}");
            failure.get_or_insert(RunFailure::Pipeline(error));
        }
        Err(error) => {
            error!("Chunk worker did not finish: {error}");
            failure.get_or_insert(RunFailure::Worker(error.to_string()));
        }
    }
}
