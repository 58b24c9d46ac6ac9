//! Per-algorithm benchmark driver
//!
//! KEMs are timed on keygen, encapsulate and decapsulate; signature schemes on
//! keygen, sign and verify. Every timed trial gets freshly generated inputs
//! from an untimed setup step.

use std::sync::Arc;

use pqc_lab_crypto::{AlgorithmSpec, CryptoError, Family, Operation, PqcProvider, PrimitiveAdapter};
use rand::RngCore;
use tracing::info;

use crate::error::Result;
use crate::harness::{Harness, MeasurementSummary};
use crate::selfcheck::DEFAULT_MESSAGE_LEN;

type OpResult<T> = std::result::Result<T, CryptoError>;

pub struct Benchmark<P> {
    adapter: Arc<PrimitiveAdapter<P>>,
    harness: Harness,
    iterations: usize,
    message_len: usize,
}

impl<P: PqcProvider + 'static> Benchmark<P> {
    pub fn new(adapter: Arc<PrimitiveAdapter<P>>, harness: Harness, iterations: usize) -> Self {
        Self {
            adapter,
            harness,
            iterations,
            message_len: DEFAULT_MESSAGE_LEN,
        }
    }

    /// Size of the random message signed in DSA benchmarks
    pub fn with_message_len(mut self, message_len: usize) -> Self {
        self.message_len = message_len;
        self
    }

    /// Measure every operation of `spec`, one summary per operation
    pub async fn run(&self, spec: &'static AlgorithmSpec) -> Result<Vec<MeasurementSummary>> {
        info!(
            algorithm = %spec.id,
            iterations = self.iterations,
            workers = self.harness.workers(),
            "benchmarking"
        );

        let adapter = Arc::clone(&self.adapter);
        let keygen = self
            .measure(
                Operation::Keygen,
                || Ok(()),
                move |_: &()| adapter.generate_keypair(spec),
            )
            .await?;

        let rest = match spec.family {
            Family::Kem => self.kem_operations(spec).await?,
            Family::Dsa => self.dsa_operations(spec).await?,
        };

        let mut summaries = Vec::with_capacity(3);
        summaries.push(keygen);
        summaries.extend(rest);
        Ok(summaries)
    }

    async fn kem_operations(
        &self,
        spec: &'static AlgorithmSpec,
    ) -> Result<[MeasurementSummary; 2]> {
        let (setup, adapter) = (Arc::clone(&self.adapter), Arc::clone(&self.adapter));
        let encapsulate = self
            .measure(
                Operation::Encapsulate,
                move || setup.generate_keypair(spec),
                move |pair| adapter.encapsulate(spec, &pair.public_key),
            )
            .await?;

        let (setup, adapter) = (Arc::clone(&self.adapter), Arc::clone(&self.adapter));
        let decapsulate = self
            .measure(
                Operation::Decapsulate,
                move || {
                    let pair = setup.generate_keypair(spec)?;
                    let sent = setup.encapsulate(spec, &pair.public_key)?;
                    Ok((pair, sent))
                },
                move |(pair, sent)| adapter.decapsulate(spec, &pair.secret_key, &sent.ciphertext),
            )
            .await?;

        Ok([encapsulate, decapsulate])
    }

    async fn dsa_operations(
        &self,
        spec: &'static AlgorithmSpec,
    ) -> Result<[MeasurementSummary; 2]> {
        let mut message = vec![0u8; self.message_len];
        rand::thread_rng().fill_bytes(&mut message);
        let message: Arc<[u8]> = message.into();

        let (setup, adapter) = (Arc::clone(&self.adapter), Arc::clone(&self.adapter));
        let msg = Arc::clone(&message);
        let sign = self
            .measure(
                Operation::Sign,
                move || setup.generate_keypair(spec),
                move |pair| adapter.sign(spec, &pair.secret_key, &msg),
            )
            .await?;

        let (setup, adapter) = (Arc::clone(&self.adapter), Arc::clone(&self.adapter));
        let msg = Arc::clone(&message);
        let verify = self
            .measure(
                Operation::Verify,
                move || {
                    let pair = setup.generate_keypair(spec)?;
                    let signature = setup.sign(spec, &pair.secret_key, &message)?;
                    Ok((pair.into_public(), signature))
                },
                move |(public_key, signature)| adapter.verify(spec, public_key, &msg, signature),
            )
            .await?;

        Ok([sign, verify])
    }

    async fn measure<S, T, Setup, Op>(
        &self,
        operation: Operation,
        setup: Setup,
        op: Op,
    ) -> Result<MeasurementSummary>
    where
        S: 'static,
        T: 'static,
        Setup: Fn() -> OpResult<S> + Send + Sync + 'static,
        Op: Fn(&S) -> OpResult<T> + Send + Sync + 'static,
    {
        let name = operation.as_str();
        if self.harness.workers() > 1 {
            self.harness
                .measure_parallel(name, self.iterations, setup, op)
                .await
        } else {
            self.harness
                .measure_with_setup(name, self.iterations, setup, op)
        }
    }
}
