use safeplan::planner::astar::AstarPlanner;
use safeplan::{path_cost, Coord, OccupancyGrid, Planner};

// The heuristic_factor scales the heuristic, so nodes closer to the goal (ignoring obstacles) are
// expanded sooner. This is Weighted A*: often faster, no longer guaranteed to be shortest.
fn main() {
    const N: i32 = 30;
    let mut grid = OccupancyGrid::from_fn(&[N as usize, N as usize], |c| {
        let (x, y) = (c[0], c[1]);
        x == 0 || y == 0 || x == N - 1 || y == N - 1
    });
    for x in 8..16 {
        for y in 8..16 {
            grid.set(&[x, y], true);
        }
    }
    for y in 3..9 {
        for x in 0..6 {
            grid.set(&[x, y], true);
        }
    }
    println!("{}", grid);
    let start = Coord::from([1, 1]);
    let end = Coord::from([N - 3, N - 3]);
    for planner in [AstarPlanner::new(), AstarPlanner::weighted(1.3)] {
        let result = planner.plan(&start, &end, &grid).unwrap();
        println!(
            "heuristic factor {}: {} cells, cost {:.3}",
            planner.heuristic_factor,
            result.path.len(),
            path_cost(&result.path)
        );
    }
}
