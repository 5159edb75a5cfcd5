use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::dependency::{Dependency, ShuffleDependencyTrait};
use crate::error::Result;
use crate::rdd::RddBase;
use crate::scheduler::LocalScheduler;

// Lineage walk: runs, parents first, every stage the given collection is still missing.
//
// The walk stops at storage points that are already materialized. Narrow dependencies are
// followed; a shuffle dependency whose map output is not available gets its parent prepared
// and its map stage run. A node that needs a barrier of its own (an unmaterialized cache or an
// index numbering) gets it after its dependencies are in place.
impl LocalScheduler {
    pub(super) fn submit_missing_stages(&self, rdd: Arc<dyn RddBase>) -> Result<()> {
        let mut visited = HashSet::new();
        self.visit(rdd, &mut visited)
    }

    fn visit(&self, rdd: Arc<dyn RddBase>, visited: &mut HashSet<usize>) -> Result<()> {
        if !visited.insert(rdd.get_rdd_id()) || rdd.is_materialized() {
            return Ok(());
        }
        for dep in rdd.get_dependencies() {
            match dep {
                Dependency::NarrowDependency(nar_dep) => {
                    self.visit(nar_dep.get_rdd_base(), visited)?;
                }
                Dependency::ShuffleDependency(shuf_dep) => {
                    let context = rdd.get_context();
                    if !context.shuffle_manager.is_available(shuf_dep.get_shuffle_id()) {
                        self.visit(shuf_dep.get_rdd_base(), visited)?;
                        self.run_shuffle_map_stage(shuf_dep)?;
                    }
                }
            }
        }
        if rdd.needs_barrier_stage() {
            self.run_barrier_stage(rdd)?;
        }
        Ok(())
    }

    fn run_shuffle_map_stage(&self, dep: Arc<dyn ShuffleDependencyTrait>) -> Result<()> {
        let stage_id = self.new_stage_id();
        let shuffle_id = dep.get_shuffle_id();
        let num_reduces = dep.get_partitioner().get_num_of_partitions();
        let parent = dep.get_rdd_base();
        let start = Instant::now();
        log::debug!(
            "shuffle map stage {} for shuffle #{} over collection #{}",
            stage_id,
            shuffle_id,
            parent.get_rdd_id()
        );

        let task_dep = dep.clone();
        let records = self.run_stage(stage_id, move |task| {
            task_dep.do_shuffle_task(task.split_id)
        })?;

        parent.get_context().shuffle_manager.register_map_outputs(
            shuffle_id,
            self.num_workers(),
            num_reduces,
        );
        log::debug!(
            "shuffle #{} wrote {} records in {:.3} s",
            shuffle_id,
            records.iter().sum::<usize>(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn run_barrier_stage(&self, rdd: Arc<dyn RddBase>) -> Result<()> {
        let stage_id = self.new_stage_id();
        log::debug!(
            "barrier stage {} for collection #{} ({:?})",
            stage_id,
            rdd.get_rdd_id(),
            rdd.get_op_kind()
        );
        let task_rdd = rdd.clone();
        let counts = self.run_stage(stage_id, move |task| {
            task_rdd.run_barrier_task(task.split_id)
        })?;
        rdd.complete_barrier(counts)
    }
}
