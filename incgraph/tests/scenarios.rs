mod common;

use common::*;
use incgraph::{
    app::{AppKind, Bfs, Sssp},
    cluster::{merged_values, result_file, run_cluster, run_configured},
    config::WorkerConfigBuilder,
    errors::{GraphError, WorkerError},
};
use incgraph_api::core::utils::logging::global_info_logger;
use itertools::Itertools;
use pretty_assertions::assert_eq;

const INF: f64 = f64::INFINITY;

#[test]
fn deleting_a_parent_edge_resets_the_dependent_chain() {
    global_info_logger();
    let efile = write_file("1 2\n2 3\n");
    let update = write_file("d 1 2\n");
    for fnum in 1..=3 {
        let config = worker_config(efile.path(), update.path(), fnum, 2);
        let outputs = run_cluster(&config, Sssp::new(1)).unwrap();
        assert_eq!(outputs.len(), fnum);
        assert!(outputs.iter().all(|out| out.stats.global_reset == 2));
        assert_eq!(outputs.iter().map(|out| out.stats.local_reset).sum::<usize>(), 2);
        assert_eq!(merged_values(&outputs), vec![(1, 0.0), (2, INF), (3, INF)]);
    }
}

#[test]
fn empty_update_reproduces_the_batch_result() {
    let efile = write_file("0 1 4\n0 2 1\n2 1 1\n1 3 1\n3 0 2\n");
    let update = write_file("");
    let config = worker_config(efile.path(), update.path(), 2, 2);
    let outputs = run_cluster(&config, Sssp::new(0)).unwrap();
    assert!(outputs.iter().all(|out| out.stats.global_reset == 0));
    assert_eq!(
        merged_values(&outputs),
        vec![(0, 0.0), (1, 2.0), (2, 1.0), (3, 3.0)]
    );
}

#[test]
fn remote_invalidation_is_checked_against_the_owners_parent() {
    // 0 lives on fragment 0, 1 on fragment 1; resetting 1 notifies the owner
    // of 0, which keeps its value because 0 does not depend on 1
    let efile = write_file("0 1 1\n1 0 1\n0 2 5\n");
    let update = write_file("d 0 1\n");
    let config = worker_config(efile.path(), update.path(), 2, 1);
    let outputs = run_cluster(&config, Sssp::new(0)).unwrap();
    assert_eq!(merged_values(&outputs), vec![(0, 0.0), (1, INF), (2, 5.0)]);
}

#[test]
fn zero_weight_cycle_does_not_keep_itself_alive() {
    // 1 and 2 reach each other for free, only 3 -> 2 connects them to the source
    let efile = write_file("3 2 0\n2 1 0\n1 2 0\n");
    let update = write_file("d 3 2\n");
    for fnum in 1..=3 {
        let config = worker_config(efile.path(), update.path(), fnum, 2);
        let outputs = run_cluster(&config, Sssp::new(3)).unwrap();
        assert!(outputs.iter().all(|out| out.stats.global_reset == 2));
        assert_eq!(merged_values(&outputs), vec![(1, INF), (2, INF), (3, 0.0)]);
    }
}

#[test]
fn equal_distance_parents_on_different_fragments() {
    // 4 is reached at distance 2 through 1 (fragment 1) and through 2
    // (fragment 0); 5 hangs off 4 and points back at it for free
    let efile = write_file("0 1 1\n0 2 1\n1 4 1\n2 4 1\n4 5 0\n5 4 0\n");

    let mut resets = vec![];
    for deleted in ["d 1 4\n", "d 2 4\n"] {
        let update = write_file(deleted);
        let config = worker_config(efile.path(), update.path(), 2, 2);
        let outputs = run_cluster(&config, Sssp::new(0)).unwrap();
        assert_eq!(
            merged_values(&outputs),
            vec![(0, 0.0), (1, 1.0), (2, 1.0), (4, 2.0), (5, 2.0)]
        );
        resets.push(outputs[0].stats.global_reset);
    }
    // only the edge 4 actually depends on invalidates anything
    resets.sort();
    assert_eq!(resets, vec![0, 2]);

    let update = write_file("d 1 4\nd 2 4\n");
    let config = worker_config(efile.path(), update.path(), 2, 2);
    let outputs = run_cluster(&config, Sssp::new(0)).unwrap();
    assert!(outputs.iter().all(|out| out.stats.global_reset == 2));
    assert_eq!(
        merged_values(&outputs),
        vec![(0, 0.0), (1, 1.0), (2, 1.0), (4, INF), (5, INF)]
    );
}

#[test]
fn insertions_only_improve_results() {
    let efile = write_file("0 1 10\n1 2 10\n");
    let update = write_file("a 0 2 3\na 2 7 1\n");
    let config = worker_config(efile.path(), update.path(), 3, 2);
    let outputs = run_cluster(&config, Sssp::new(0)).unwrap();
    assert!(outputs.iter().all(|out| out.stats.global_reset == 0));
    assert_eq!(
        merged_values(&outputs),
        vec![(0, 0.0), (1, 10.0), (2, 3.0), (7, 4.0)]
    );
}

#[test]
fn incremental_run_matches_a_run_on_the_updated_file() {
    let base = "0 1 1\n1 2 1\n2 3 1\n0 4 2\n4 3 2\n3 5 1\n5 6 1\n6 1 1\n";
    let efile = write_file(base);
    let update = write_file("d 1 2\nd 4 3\na 6 2 1\na 0 6 9\n");
    let incremental = run_cluster(
        &worker_config(efile.path(), update.path(), 3, 2),
        Sssp::new(0),
    )
    .unwrap();

    let updated = write_file("0 1 1\n2 3 1\n0 4 2\n3 5 1\n5 6 1\n6 1 1\n6 2 1\n0 6 9\n");
    let empty = write_file("");
    let scratch = run_cluster(&worker_config(updated.path(), empty.path(), 1, 1), Sssp::new(0))
        .unwrap();

    assert_eq!(merged_values(&incremental), merged_values(&scratch));
}

#[test]
fn undirected_bfs_follows_both_directions() {
    let efile = write_file("0 1\n1 2\n2 3\n");
    let update = write_file("d 2 1\na 3 0\n");
    let config = WorkerConfigBuilder::from(worker_config(efile.path(), update.path(), 2, 2))
        .with_directed(false)
        .build();
    let outputs = run_cluster(&config, Bfs::new(0)).unwrap();
    assert_eq!(
        merged_values(&outputs),
        vec![(0, 0), (1, 1), (2, 2), (3, 1)]
    );
}

#[test]
fn results_are_written_per_fragment() {
    let efile = write_file("1 2 2\n2 3 2\n");
    let update = write_file("a 1 3 1\n");
    let out_dir = tempfile::tempdir().unwrap();
    let config = WorkerConfigBuilder::from(worker_config(efile.path(), update.path(), 2, 1))
        .with_out_prefix(out_dir.path())
        .with_application(AppKind::Sssp)
        .with_sssp_source(1)
        .build();

    let lines = run_configured(&config).unwrap();
    assert_eq!(lines, vec!["1 0", "2 2", "3 1"]);

    let mut written = (0..2)
        .flat_map(|fid| {
            std::fs::read_to_string(result_file(out_dir.path(), fid))
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect_vec()
        })
        .collect_vec();
    written.sort();
    assert_eq!(written, lines);
    // fragment 1 owns the odd oids
    assert_eq!(
        std::fs::read_to_string(result_file(out_dir.path(), 1)).unwrap(),
        "1 0\n3 1\n"
    );
}

#[test]
fn missing_update_file_fails_every_worker() {
    let efile = write_file("1 2\n");
    let config = WorkerConfigBuilder::new()
        .with_efile(efile.path())
        .with_fnum(2)
        .build();
    let err = run_cluster(&config, Sssp::new(1)).unwrap_err();
    assert!(matches!(err, WorkerError::MissingUpdateFile), "{err}");
}

#[test]
fn deleting_edges_of_unknown_vertices_aborts_the_cluster() {
    let efile = write_file("1 2\n2 3\n");
    let update = write_file("d 2 42\n");
    let err = run_cluster(&worker_config(efile.path(), update.path(), 2, 1), Sssp::new(1))
        .unwrap_err();
    assert!(
        matches!(err, WorkerError::Graph(GraphError::UnknownVertex(42))),
        "{err}"
    );
}

#[test]
fn unreadable_edge_file_is_reported() {
    let update = write_file("");
    let config = worker_config(
        std::path::Path::new("/definitely/not/here.e"),
        update.path(),
        2,
        1,
    );
    let err = run_cluster(&config, Sssp::new(1)).unwrap_err();
    assert!(matches!(err, WorkerError::Graph(GraphError::ReadFile { .. })), "{err}");
}
