//! CSV export of finished task records (§4.11), grounded on
//! `EFairScheduler::export_task_data` in
//! `original_source/efair/scheduler/scheduler.cpp`. Timestamps are written
//! relative to the earliest `start_t` among finished tasks, matching the
//! original's `min_time` baseline.

use std::io::Write;
use std::path::Path;

use crate::error::{EfairError, Result};
use crate::task::TaskPool;

const HEADER: &str = "task_id,entity_id,model_id,start_t,end_t,service_time,energy_used\n";

pub fn write_csv(tasks: &TaskPool, path: &Path) -> Result<()> {
    let finished = tasks.all_finished();

    let min_start_t = finished
        .iter()
        .filter_map(|t| t.start_t())
        .min();

    let mut out = String::new();
    out.push_str(HEADER);

    if let Some(min_start_t) = min_start_t {
        for task in &finished {
            let start_t = task.start_t().expect("finished task has a start_t");
            let end_t = task.end_t().expect("finished task has an end_t");
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                task.id,
                task.entity_id,
                task.model_id,
                (start_t - min_start_t).as_micros(),
                (end_t - min_start_t).as_micros(),
                task.service_time_us(),
                task.energy_used_uj(),
            ));
        }
    }

    let mut file = std::fs::File::create(path)
        .map_err(|e| EfairError::Fail(format!("cannot save task data to file {path:?}: {e}")))?;
    file.write_all(out.as_bytes())
        .map_err(|e| EfairError::Fail(format!("writing {path:?}: {e}")))?;

    Ok(())
}
