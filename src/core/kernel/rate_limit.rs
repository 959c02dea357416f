use crate::core::config::ConfigError;
use crate::core::errors::CbproError;
use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

/// A group of API paths sharing one rate-limit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    /// Unauthenticated market endpoints: 3 requests/second, bursts to 6
    Public,
    /// Authenticated endpoints without a custom limit: 5 requests/second, bursts to 10
    Private,
    /// `/accounts` family, limited per profile: 25 requests/second, bursts to 50
    Accounts,
}

impl EndpointClass {
    pub const ALL: [Self; 3] = [Self::Public, Self::Private, Self::Accounts];

    pub fn default_limit(self) -> RateLimit {
        match self {
            Self::Public => RateLimit::per_second(nonzero!(3u32), nonzero!(6u32)),
            Self::Private => RateLimit::per_second(nonzero!(5u32), nonzero!(10u32)),
            Self::Accounts => RateLimit::per_second(nonzero!(25u32), nonzero!(50u32)),
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Accounts => "accounts",
        };
        f.write_str(name)
    }
}

/// What a dispatch does when its class has no permit left
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Return `RateLimited` without sending anything
    #[default]
    FailFast,
    /// Wait for the next permit, then send
    Block,
}

/// Sustained rate and burst allowance for one endpoint class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    sustained: Sustained,
    burst: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sustained {
    PerSecond(NonZeroU32),
    Period(Duration),
}

impl RateLimit {
    pub const fn per_second(sustained: NonZeroU32, burst: NonZeroU32) -> Self {
        Self {
            sustained: Sustained::PerSecond(sustained),
            burst,
        }
    }

    /// One permit is replenished every `period`; at most `burst` are held.
    pub fn with_period(period: Duration, burst: u32) -> Result<Self, ConfigError> {
        if period.is_zero() {
            return Err(ConfigError::InvalidConfiguration(
                "rate limit replenish period must be non-zero".to_string(),
            ));
        }
        let burst = NonZeroU32::new(burst).ok_or_else(|| {
            ConfigError::InvalidConfiguration("rate limit burst must be non-zero".to_string())
        })?;
        Ok(Self {
            sustained: Sustained::Period(period),
            burst,
        })
    }

    pub const fn burst(&self) -> NonZeroU32 {
        self.burst
    }

    fn quota(&self) -> Quota {
        let base = match self.sustained {
            Sustained::PerSecond(rate) => Quota::per_second(rate),
            // with_period only fails on a zero duration, rejected in the constructor
            Sustained::Period(period) => {
                Quota::with_period(period).unwrap_or_else(|| Quota::per_second(nonzero!(1u32)))
            }
        };
        base.allow_burst(self.burst)
    }
}

/// Per-class token budgets shared by every request sent through one client.
///
/// Each class has its own GCRA limiter, so permits are taken with a single
/// atomic update and no lock is held while a request is in flight.
pub struct RateLimiter {
    limiters: HashMap<EndpointClass, DefaultDirectRateLimiter>,
    policy: RateLimitPolicy,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("classes", &self.limiters.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Documented upstream limits for every class
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_limits(policy, std::iter::empty())
    }

    /// Documented limits, with `overrides` replacing individual classes
    pub fn with_limits(
        policy: RateLimitPolicy,
        overrides: impl IntoIterator<Item = (EndpointClass, RateLimit)>,
    ) -> Self {
        let mut limits: HashMap<EndpointClass, RateLimit> = EndpointClass::ALL
            .iter()
            .map(|class| (*class, class.default_limit()))
            .collect();
        limits.extend(overrides);

        let limiters = limits
            .into_iter()
            .map(|(class, limit)| (class, DefaultDirectRateLimiter::direct(limit.quota())))
            .collect();

        Self { limiters, policy }
    }

    pub const fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Take one permit for `class` before sending to `path`.
    pub async fn acquire(&self, class: EndpointClass, path: &str) -> Result<(), CbproError> {
        let Some(limiter) = self.limiters.get(&class) else {
            return Ok(());
        };

        match self.policy {
            RateLimitPolicy::FailFast => {
                if limiter.check().is_err() {
                    warn!(%class, path, "rate limit budget exhausted");
                    return Err(CbproError::RateLimited {
                        class,
                        path: path.to_string(),
                    });
                }
            }
            RateLimitPolicy::Block => {
                if limiter.check().is_err() {
                    debug!(%class, path, "waiting for rate limit permit");
                    limiter.until_ready().await;
                }
            }
        }
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}
