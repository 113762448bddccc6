use safeplan::planner::rrt::Rrt;
use safeplan::{Coord, OccupancyGrid, Planner};

// RRT samples from a seeded generator, so a fixed seed repeats the same tree and path. The CBF
// variant additionally rejects extensions heading into obstacle clusters.
fn main() {
    let mut grid = OccupancyGrid::new(&[24, 24], false);
    for y in 0..18 {
        grid.set(&[12, y], true);
    }
    let start = Coord::from([2, 2]);
    let end = Coord::from([21, 2]);
    for (name, planner) in [
        ("RRT", Rrt::default().with_seed(7)),
        ("CBF-RRT", Rrt::default().with_barrier(1.0, 1.0).with_seed(7)),
    ] {
        let result = planner.plan_waypoints(&start, &end, &grid).unwrap();
        if result.success {
            println!("{name}: {} waypoints", result.path.len());
            for p in &result.path {
                println!("  {}", p);
            }
        } else {
            println!("{name}: {:?}", result.diagnostics);
        }
    }
}
