//! Dispatch engine
//!
//! An emission snapshots the subscriber list, marshals the arguments once
//! and invokes every snapshotted subscriber in connection order while
//! holding the host execution lock. A failing subscriber does not stop the
//! others; failures are collected into the [`DispatchReport`] and handed to
//! the error hook (or logged).
//!
//! Emissions from threads other than the host thread are either queued for
//! [`Bridge::process_pending`](crate::Bridge::process_pending) or dispatched
//! by the emitting thread under the host lock, depending on
//! [`CrossThreadPolicy`]. A blocking emission that cannot get the host lock
//! in time is queued as well.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use slotbridge_sdk::{check_args, InstanceId, NativeRef, NativeValue, SignalDescriptor, Signature};

use crate::bridge::BridgeShared;
use crate::connection::{ConnectionId, SignalKey, SlotTarget};
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostValue;
use crate::marshal::Marshaler;
use crate::options::CrossThreadPolicy;
use crate::ownership::Provenance;
use crate::signal::SignalSource;

/// How long a `Block` emission from another thread waits for the host lock
/// before it is queued instead
const BLOCK_WAIT: Duration = Duration::from_millis(50);

/// Callback receiving subscriber failures
pub type ErrorHook = Arc<dyn Fn(&SubscriberFailure) + Send + Sync>;

/// One subscriber that failed during an emission
#[derive(Debug, Clone)]
pub struct SubscriberFailure {
    /// Canonical signal signature
    pub signal: String,
    /// Emitting instance
    pub source: InstanceId,
    /// The failing connection
    pub connection: ConnectionId,
    /// Subscriber name
    pub subscriber: String,
    /// What went wrong
    pub error: BridgeError,
}

/// Outcome of one emission
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Subscribers that ran to completion
    pub delivered: usize,
    /// Subscribers that failed, in invocation order
    pub failures: Vec<SubscriberFailure>,
}

impl DispatchReport {
    /// True if every subscriber succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An emission waiting for the host thread
pub(crate) struct PendingEmission {
    source: NativeRef,
    signal: Arc<str>,
    args: Vec<NativeValue>,
}

impl BridgeShared {
    pub(crate) fn is_host_thread(&self) -> bool {
        *self.host_thread.lock() == thread::current().id()
    }

    /// Deliver an emission to the current subscribers of `signal` on `source`
    pub(crate) fn dispatch(
        self: &Arc<Self>,
        source: &NativeRef,
        signal: &SignalDescriptor,
        args: &[NativeValue],
    ) -> BridgeResult<DispatchReport> {
        let key = SignalKey::new(source.id(), signal);
        let subscribers = self.connections.lock().snapshot(&key);
        if subscribers.is_empty() {
            return Ok(DispatchReport::default());
        }

        let _host = self.host_lock.lock();
        let needs_host_args = subscribers
            .iter()
            .any(|s| matches!(s.target, SlotTarget::Host(_)));
        let host_args = if needs_host_args {
            Marshaler::new(self).args_to_host(signal.params(), args, Provenance::Argument)?
        } else {
            Vec::new()
        };

        let mut report = DispatchReport::default();
        for subscription in &subscribers {
            let outcome = match &subscription.target {
                SlotTarget::Host(callable) => callable.invoke(&host_args).map(drop),
                SlotTarget::Native { receiver, slot, .. } => match receiver.upgrade() {
                    Some(target) if !target.is_destroyed() => self
                        .invoke_native(&target, slot, &args[..slot.params.len()])
                        .map(drop),
                    _ => Err(BridgeError::StaleSubscription {
                        callable: subscription.target.describe(),
                    }),
                },
            };

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    if matches!(error, BridgeError::StaleSubscription { .. }) {
                        warn!(
                            "removing stale subscription {} from {}",
                            subscription.target.describe(),
                            key
                        );
                        let removed = self.connections.lock().remove_by_id(&key, subscription.id);
                        drop(removed);
                    }
                    report.failures.push(SubscriberFailure {
                        signal: key.signature.to_string(),
                        source: key.instance,
                        connection: subscription.id,
                        subscriber: subscription.target.describe(),
                        error,
                    });
                }
            }
        }

        self.report_failures(&report.failures);
        Ok(report)
    }

    fn report_failures(&self, failures: &[SubscriberFailure]) {
        if failures.is_empty() {
            return;
        }
        let hook = self.error_hook.read().clone();
        for failure in failures {
            match &hook {
                Some(hook) => hook(failure),
                None if self.options.log_subscriber_errors => error!(
                    "subscriber {} of {} on {} failed: {}",
                    failure.subscriber, failure.signal, failure.source, failure.error
                ),
                None => {}
            }
        }
    }

    /// Emission requested by host code
    pub(crate) fn emit_from_host(
        self: &Arc<Self>,
        source: SignalSource,
        args: &[HostValue],
    ) -> BridgeResult<DispatchReport> {
        let (proxy, signal) = source.resolve(self)?;
        if proxy.is_destroyed() {
            return Err(BridgeError::ObjectDestroyed(proxy.instance_id().as_u64()));
        }
        let native_args = Marshaler::new(self).args_to_native(signal.params(), args)?;
        self.dispatch(proxy.native(), &signal, &native_args)
    }

    /// Emission requested by native code, from any thread
    pub(crate) fn native_emit(
        self: &Arc<Self>,
        source: &NativeRef,
        signal: &str,
        args: &[NativeValue],
    ) -> BridgeResult<()> {
        let canonical = Signature::parse(signal)?.canonical();
        let desc = source
            .descriptor()
            .signal(&canonical)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownSignal {
                class: source.descriptor().class_name().to_string(),
                signal: signal.to_string(),
            })?;
        self.check_argument_limit(args.len())?;
        check_args(desc.name(), desc.params(), args)?;
        if source.is_destroyed() {
            return Err(BridgeError::ObjectDestroyed(source.id().as_u64()));
        }

        let key = SignalKey::new(source.id(), &desc);
        if self.connections.lock().len(&key) == 0 {
            return Ok(());
        }

        if self.is_host_thread() {
            return self.dispatch(source, &desc, args).map(drop);
        }
        if self.options.cross_thread == CrossThreadPolicy::Block {
            // the lock holder may be joining this thread
            if let Some(_host) = self.host_lock.try_lock_for(BLOCK_WAIT) {
                return self.dispatch(source, &desc, args).map(drop);
            }
            debug!("host lock busy, falling back to queueing {}", key);
        }

        debug!("queue {} from {:?}", key, thread::current().id());
        self.pending_tx
            .send(PendingEmission {
                source: source.clone(),
                signal: desc.canonical().clone(),
                args: args.to_vec(),
            })
            .map_err(|_| BridgeError::Config("pending emission queue is closed".to_string()))
    }

    /// Deliver queued cross-thread emissions; returns how many were delivered
    pub(crate) fn process_pending(self: &Arc<Self>) -> usize {
        let mut delivered = 0;
        while let Ok(pending) = self.pending_rx.try_recv() {
            if pending.source.is_destroyed() {
                debug!(
                    "dropping queued {} from destroyed {}",
                    pending.signal,
                    pending.source.id()
                );
                continue;
            }
            let Some(signal) = pending.source.descriptor().signal(&pending.signal).cloned() else {
                continue;
            };
            match self.dispatch(&pending.source, &signal, &pending.args) {
                Ok(_) => delivered += 1,
                Err(e) => error!("queued emission of {} failed: {}", pending.signal, e),
            }
        }
        delivered
    }

    /// Drop queued emissions without delivering them
    pub(crate) fn discard_pending(&self) -> usize {
        self.pending_rx.try_iter().count()
    }
}
