use crate::ppo::UpdateReport;
use std::io;
use tracing::info;

/// Destination for per-update training metrics.
pub trait TrainingLogger {
    /// # Errors
    ///
    /// Returns an error if the sink cannot record the report.
    fn log_update(&mut self, report: &UpdateReport) -> io::Result<()>;
}

/// Emits one `tracing` event per logged update.
#[derive(Default)]
pub struct TracingLogger;

impl TrainingLogger for TracingLogger {
    fn log_update(&mut self, report: &UpdateReport) -> io::Result<()> {
        info!(
            update = report.update,
            timesteps = report.num_timesteps,
            ep_rew_mean = report.ep_rew_mean,
            ep_len_mean = report.ep_len_mean,
            success_rate = report.success_rate,
            policy_loss = report.policy_loss,
            value_loss = report.value_loss,
            approx_kl = report.approx_kl,
            "ppo update"
        );
        Ok(())
    }
}
