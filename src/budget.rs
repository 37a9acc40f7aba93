use std::time::Duration;

use tokio::time::Instant;

/// Wall-clock allowance for one solve request. Started once, never reset.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
	started: Instant,
	total: Duration,
}

impl TimeBudget {
	pub fn start(total: Duration) -> Self {
		Self { started: Instant::now(), total }
	}

	pub fn elapsed(&self) -> Duration {
		self.started.elapsed()
	}

	/// Zero once the budget is spent
	pub fn remaining(&self) -> Duration {
		self.total.saturating_sub(self.elapsed())
	}

	/// Whether there is strictly more than `margin` left
	pub fn allows_another(&self, margin: Duration) -> bool {
		self.remaining() > margin
	}

	/// `timeout` shortened to what is left of the budget
	pub fn cap(&self, timeout: Duration) -> Duration {
		timeout.min(self.remaining())
	}
}
