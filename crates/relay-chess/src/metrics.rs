use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Prometheus metrics for the optimistic move registry.
pub struct OptimisticMetrics {
    /// Number of records currently held, terminal ones included.
    pub tracked: IntGauge,
    /// Number of records awaiting the network.
    pub in_flight: IntGauge,
    /// Moves that reached `Confirmed`.
    pub confirmed: IntCounter,
    /// Moves that reached `Failed`.
    pub failed: IntCounter,
    /// Moves rejected by local validation.
    pub rejected: IntCounter,
    /// Game-state records discarded as stale.
    pub stale_states: IntCounter,
}

impl OptimisticMetrics {
    /// Create metrics and register them with the given prometheus registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let tracked = IntGauge::with_opts(Opts::new(
            "optimistic_moves_tracked",
            "Number of optimistic moves held in the registry",
        ))?;
        let in_flight = IntGauge::with_opts(Opts::new(
            "optimistic_moves_in_flight",
            "Number of optimistic moves awaiting confirmation",
        ))?;
        let confirmed = IntCounter::with_opts(Opts::new(
            "optimistic_moves_confirmed_total",
            "Optimistic moves confirmed",
        ))?;
        let failed = IntCounter::with_opts(Opts::new(
            "optimistic_moves_failed_total",
            "Optimistic moves that failed",
        ))?;
        let rejected = IntCounter::with_opts(Opts::new(
            "optimistic_moves_rejected_total",
            "Moves rejected by local validation",
        ))?;
        let stale_states = IntCounter::with_opts(Opts::new(
            "game_states_stale_total",
            "Game-state records discarded as stale",
        ))?;

        registry.register(Box::new(tracked.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(confirmed.clone()))?;
        registry.register(Box::new(failed.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(stale_states.clone()))?;

        Ok(Self {
            tracked,
            in_flight,
            confirmed,
            failed,
            rejected,
            stale_states,
        })
    }

    /// Create metrics without registering (for testing).
    pub fn unregistered() -> Self {
        Self {
            tracked: IntGauge::new("optimistic_moves_tracked", "tracked")
                .expect("valid metric name"),
            in_flight: IntGauge::new("optimistic_moves_in_flight", "in flight")
                .expect("valid metric name"),
            confirmed: IntCounter::new("optimistic_moves_confirmed_total", "confirmed")
                .expect("valid metric name"),
            failed: IntCounter::new("optimistic_moves_failed_total", "failed")
                .expect("valid metric name"),
            rejected: IntCounter::new("optimistic_moves_rejected_total", "rejected")
                .expect("valid metric name"),
            stale_states: IntCounter::new("game_states_stale_total", "stale")
                .expect("valid metric name"),
        }
    }
}

impl Default for OptimisticMetrics {
    fn default() -> Self {
        Self::unregistered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_metrics_work() {
        let m = OptimisticMetrics::unregistered();
        m.tracked.set(3);
        m.failed.inc();
        assert_eq!(m.tracked.get(), 3);
        assert_eq!(m.failed.get(), 1);
    }

    #[test]
    fn registered_metrics_work() {
        let r = Registry::new();
        let m = OptimisticMetrics::new(&r).unwrap();
        m.confirmed.inc_by(2);
        assert_eq!(m.confirmed.get(), 2);
        assert_eq!(r.gather().len(), 6);
    }

    #[test]
    fn double_registration_fails() {
        let r = Registry::new();
        let _first = OptimisticMetrics::new(&r).unwrap();
        assert!(OptimisticMetrics::new(&r).is_err());
    }
}
