use parking_lot::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

/// Token bucket rate limiter for outbound provider calls.
///
/// The bucket holds at most `requests_per_minute` tokens and refills
/// continuously at `requests_per_minute / 60` tokens per second. Every
/// provider request debits exactly one token; when the bucket is dry the
/// caller is suspended until a full token has accrued.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    /// Tokens per second.
    rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Debit one token, or report how long until one is available.
    fn take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(needed / self.rate))
        }
    }
}

impl RateLimiter {
    /// Create a limiter whose bucket starts full.
    ///
    /// # Arguments
    /// * `requests_per_minute` - provider quota; also the burst capacity
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f64;
        Self {
            bucket: Mutex::new(TokenBucket {
                tokens: capacity,
                capacity,
                rate: capacity / 60.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until a token is available and consume it.
    pub async fn acquire(&self) {
        loop {
            // Lock is released before sleeping
            let wait = match self.bucket.lock().take(Instant::now()) {
                Ok(()) => return,
                Err(wait) => wait,
            };

            debug!("Rate limiter: waiting {:?} for next token", wait);
            sleep(wait).await;
        }
    }

    /// Consume a token only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().take(Instant::now()).is_ok()
    }

    /// Current token count after refilling (for progress reports and tests).
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now());
        bucket.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.bucket.lock().capacity
    }
}
