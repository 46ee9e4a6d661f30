//! Behavioral feature formulas
//!
//! Pure functions mapping accumulated session statistics to normalized scores. Every score
//! here is clamped to [0, 1] and defined for empty input.

/// Minutes in a millisecond span
fn minutes(ms: u64) -> f64 {
    ms as f64 / 60_000.0
}

/// Events per minute over an elapsed span, 0 for an empty span
pub fn per_minute(count: u32, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    count as f64 / minutes(elapsed_ms)
}

/// Compute task switch rate using exponential saturation
///
/// Formula: `1.0 - exp(-app_switches_per_min / 0.5)`
/// This maps 0.5 switches/min to ~63% task switching, reaching near 1.0 asymptotically
pub fn task_switch_rate(app_switches_per_min: f64) -> f64 {
    (1.0 - (-app_switches_per_min / 0.5).exp()).clamp(0.0, 1.0)
}

/// Compute notification load using exponential saturation
///
/// Formula: `1.0 - exp(-notifications_per_min / 1.0)`
pub fn notification_load(notifications_per_min: f64) -> f64 {
    (1.0 - (-notifications_per_min / 1.0).exp()).clamp(0.0, 1.0)
}

/// Share of `total_ms` covered by `part_ms`
pub fn time_ratio(part_ms: u64, total_ms: u64) -> f64 {
    if total_ms == 0 {
        return 0.0;
    }
    (part_ms as f64 / total_ms as f64).clamp(0.0, 1.0)
}

/// Compute fragmented idle ratio
///
/// Formula: `idle_segment_count / session_minutes`, capped at 1.0
/// (more than one idle segment per minute is fully fragmented)
pub fn fragmented_idle_ratio(idle_segment_count: u32, session_duration_ms: u64) -> f64 {
    if session_duration_ms == 0 {
        return 0.0;
    }
    (idle_segment_count as f64 / minutes(session_duration_ms)).clamp(0.0, 1.0)
}

/// Compute scroll jitter rate
///
/// Formula: `direction_reversals / (scroll_events - 1)`
pub fn scroll_jitter_rate(direction_reversals: u32, scroll_events: u32) -> f64 {
    if scroll_events <= 1 {
        return 0.0;
    }
    let max_reversals = scroll_events - 1;
    (direction_reversals as f64 / max_reversals as f64).clamp(0.0, 1.0)
}

/// Burstiness using the Barabási formula
///
/// Formula: `((σ - μ) / (σ + μ) + 1) / 2`
///
/// Result: 0.0 = perfectly regular, 0.5 = random (Poisson), 1.0 = very bursty.
/// Returns 0.5 when the mean gap is not positive.
pub fn burstiness(mean: f64, std_dev: f64) -> f64 {
    if mean <= 0.0 || !mean.is_finite() {
        return 0.5;
    }
    let barabasi = (std_dev - mean) / (std_dev + mean);
    ((barabasi + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Stability index: normalized inverse variance of intervals
///
/// Formula: `1 / (1 + σ² / μ²)`. Identical intervals give 1.0.
pub fn stability_index(mean: f64, variance: f64) -> f64 {
    if mean <= 0.0 {
        return 1.0;
    }
    let cv_squared = variance / (mean * mean);
    (1.0 / (1.0 + cv_squared)).clamp(0.0, 1.0)
}

/// Cadence stability from the coefficient of variation of inter-keystroke intervals
///
/// Formula: `1 / (1 + σ / μ)`
pub fn cadence_stability(mean: f64, std_dev: f64) -> f64 {
    if mean <= 0.0 {
        return 1.0;
    }
    (1.0 / (1.0 + std_dev / mean)).clamp(0.0, 1.0)
}

/// Clustering index of arrivals against a uniform baseline
///
/// Uses the squared coefficient of variation of inter-arrival times (the Fano-factor
/// analogue for interval data): `cv² / (1 + cv²)`. Periodic arrivals give 0.0, Poisson
/// arrivals 0.5, tight clusters approach 1.0. Simultaneous arrivals give 1.0.
pub fn clustering_index(mean: f64, variance: f64) -> f64 {
    if mean <= 0.0 {
        return 1.0;
    }
    let cv_squared = variance / (mean * mean);
    (cv_squared / (1.0 + cv_squared)).clamp(0.0, 1.0)
}

/// Fragmentation index
///
/// Formula: `(bursts - 1) / floor(span / threshold)`
///
/// Each burst boundary consumes more than one threshold of silence, so at most
/// `floor(span / threshold)` boundaries fit in the span. A single burst, or a span too
/// short for any boundary, gives 0.0.
pub fn fragmentation_index(bursts: u32, span_ms: u64, idle_threshold_ms: u64) -> f64 {
    if bursts <= 1 || idle_threshold_ms == 0 {
        return 0.0;
    }
    let slots = span_ms / idle_threshold_ms;
    if slots == 0 {
        return 0.0;
    }
    ((bursts - 1) as f64 / slots as f64).clamp(0.0, 1.0)
}

/// Compute interaction intensity
///
/// Formula: `(non_interruption_events + typing_duration_sec / 10) / session_minutes / 10`
/// ~10 interactions per minute is considered full intensity.
pub fn interaction_intensity(
    total_events: u32,
    interruption_events: u32,
    typing_duration_ms: u64,
    session_duration_ms: u64,
) -> f64 {
    if session_duration_ms == 0 {
        return 0.0;
    }

    let non_interruption_events = total_events.saturating_sub(interruption_events);
    let typing_equivalent = typing_duration_ms as f64 / 10_000.0; // 10 seconds of typing = 1 event
    let total_interaction = non_interruption_events as f64 + typing_equivalent;

    let events_per_minute = total_interaction / minutes(session_duration_ms);
    (events_per_minute / 10.0).clamp(0.0, 1.0)
}

/// Compute distraction score (weighted combination)
///
/// ```text
/// Distraction Score = 0.35 * task_switch_rate
///                   + 0.30 * notification_load
///                   + 0.20 * fragmented_idle_ratio
///                   + 0.15 * scroll_jitter_rate
/// ```
pub fn distraction_score(
    task_switch_rate: f64,
    notification_load: f64,
    fragmented_idle_ratio: f64,
    scroll_jitter_rate: f64,
) -> f64 {
    let score = 0.35 * task_switch_rate
        + 0.30 * notification_load
        + 0.20 * fragmented_idle_ratio
        + 0.15 * scroll_jitter_rate;
    score.clamp(0.0, 1.0)
}
