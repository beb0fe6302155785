//! Virtual-time task scheduler.
//!
//! Replaces wall-clock interval timers with an explicit schedule over
//! simulated seconds: the driver advances the scheduler alongside the
//! physics clock and fires whatever came due. Tasks are named so the
//! driver can dispatch on them without closures capturing replica state.

/// When a task fires.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cadence {
    /// Fires every `period` seconds, first at t = period
    Every { period: f64, next: f64 },

    /// Fires once at `at`, then never again
    Once { at: f64, fired: bool },
}

#[derive(Debug, Clone)]
struct Task {
    name: &'static str,
    cadence: Cadence,
}

/// Schedule of named tasks over virtual time.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Current virtual time in seconds
    now: f64,

    /// Registered tasks, fired in registration order
    tasks: Vec<Task>,
}

impl Scheduler {
    /// Creates an empty schedule at t = 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a periodic task; the first firing is at t = period.
    pub fn every(&mut self, name: &'static str, period: f64) {
        self.tasks.push(Task {
            name,
            cadence: Cadence::Every {
                period,
                next: self.now + period,
            },
        });
    }

    /// Registers a one-shot task at an absolute time.
    pub fn once(&mut self, name: &'static str, at: f64) {
        self.tasks.push(Task {
            name,
            cadence: Cadence::Once { at, fired: false },
        });
    }

    /// Current virtual time.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Advances the clock and returns the names of every task that came
    /// due, in registration order. A periodic task that fell more than
    /// one period behind fires once per missed period.
    pub fn advance(&mut self, dt: f64) -> Vec<&'static str> {
        self.now += dt;
        let now = self.now;

        let mut due = Vec::new();
        for task in &mut self.tasks {
            match &mut task.cadence {
                Cadence::Every { period, next } => {
                    while *next <= now {
                        due.push(task.name);
                        *next += *period;
                    }
                }
                Cadence::Once { at, fired } => {
                    if !*fired && *at <= now {
                        due.push(task.name);
                        *fired = true;
                    }
                }
            }
        }
        due
    }
}
