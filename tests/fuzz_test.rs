/// Fuzzes the planners on many random grids: graph searches find a path exactly when the goal is
/// reachable and their cost matches a brute-force shortest path, and every successful result of
/// every planner can be followed cell by cell without touching an obstacle.
use std::collections::VecDeque;

use rand::prelude::*;
use safeplan::geometry::{is_adjacent, step_cost};
use safeplan::grid::neighbor_offsets;
use safeplan::planner::astar::AstarPlanner;
use safeplan::planner::dijkstra::Dijkstra;
use safeplan::{default_planners, path_cost, Connectivity, Coord, OccupancyGrid, PlanResult, Planner};

fn random_grid(shape: &[usize], rng: &mut StdRng, density: f64) -> OccupancyGrid {
    OccupancyGrid::from_fn(shape, |_| rng.gen_bool(density))
}

fn reachable(grid: &OccupancyGrid, start: &Coord, goal: &Coord, connectivity: Connectivity) -> bool {
    let offsets = neighbor_offsets(grid.ndim(), connectivity);
    let mut seen = vec![false; grid.len()];
    let mut queue = VecDeque::from([start.clone()]);
    if let Some(ix) = grid.flat_index(start) {
        seen[ix] = true;
    }
    while let Some(cell) = queue.pop_front() {
        if cell == *goal {
            return true;
        }
        for next in grid.free_neighbors(&cell, &offsets) {
            let ix = grid.flat_index(&next).unwrap();
            if !seen[ix] {
                seen[ix] = true;
                queue.push_back(next);
            }
        }
    }
    false
}

/// Shortest path cost by Bellman-Ford relaxation over every free cell.
fn brute_force_cost(grid: &OccupancyGrid, start: &Coord, goal: &Coord, connectivity: Connectivity) -> f64 {
    let offsets = neighbor_offsets(grid.ndim(), connectivity);
    let mut dist = vec![f64::INFINITY; grid.len()];
    dist[grid.flat_index(start).unwrap()] = 0.0;
    loop {
        let mut changed = false;
        for cell in grid.coords().filter(|c| grid.is_free(c)) {
            let d = dist[grid.flat_index(&cell).unwrap()];
            if !d.is_finite() {
                continue;
            }
            for next in grid.free_neighbors(&cell, &offsets) {
                let ix = grid.flat_index(&next).unwrap();
                let candidate = d + step_cost(&cell, &next);
                if candidate < dist[ix] - 1e-12 {
                    dist[ix] = candidate;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    dist[grid.flat_index(goal).unwrap()]
}

fn assert_followable(grid: &OccupancyGrid, start: &Coord, goal: &Coord, result: &PlanResult, name: &str) {
    if !result.success {
        assert!(result.path.is_empty(), "{name}");
        return;
    }
    let ok = result.path.first() == Some(start)
        && result.path.last() == Some(goal)
        && result.path.windows(2).all(|w| is_adjacent(&w[0], &w[1]))
        && result.path.iter().all(|c| grid.is_free(c));
    if !ok {
        println!("{name}: {start} -> {goal}\n{grid}{:?}", result.path);
    }
    assert!(ok, "{name}");
}

#[test]
fn fuzz() {
    const N: usize = 10;
    const N_GRIDS: usize = 2000;
    let mut rng = StdRng::seed_from_u64(0);
    let start = Coord::from([0, 0]);
    let end = Coord::from([N as i32 - 1, N as i32 - 1]);
    for connectivity in [Connectivity::Axis, Connectivity::Full] {
        let astar = AstarPlanner {
            connectivity,
            ..AstarPlanner::new()
        };
        let dijkstra = Dijkstra { connectivity };
        for _ in 0..N_GRIDS {
            let mut grid = random_grid(&[N, N], &mut rng, 0.4);
            grid.set(&start, false);
            grid.set(&end, false);
            let reachable = reachable(&grid, &start, &end, connectivity);
            for planner in [&astar as &dyn Planner, &dijkstra] {
                let result = planner.plan(&start, &end, &grid).unwrap();
                if result.success != reachable {
                    println!("{grid}");
                }
                assert_eq!(result.success, reachable);
                assert_followable(&grid, &start, &end, &result, "search");
            }
        }
    }
}

#[test]
fn fuzz_distance() {
    const N: usize = 5;
    const N_GRIDS: usize = 2000;
    let mut rng = StdRng::seed_from_u64(0);
    let start = Coord::from([0, 0]);
    let end = Coord::from([N as i32 - 1, N as i32 - 1]);
    for connectivity in [Connectivity::Axis, Connectivity::Full] {
        let astar = AstarPlanner {
            connectivity,
            ..AstarPlanner::new()
        };
        for _ in 0..N_GRIDS {
            let mut grid = random_grid(&[N, N], &mut rng, 0.4);
            grid.set(&start, false);
            grid.set(&end, false);
            let expected = brute_force_cost(&grid, &start, &end, connectivity);
            let result = astar.plan(&start, &end, &grid).unwrap();
            assert_eq!(result.success, expected.is_finite());
            if result.success {
                let cost = path_cost(&result.path);
                if (cost - expected).abs() > 1e-9 {
                    println!("A* cost {cost}, shortest {expected}\n{grid}{:?}", result.path);
                }
                assert!((cost - expected).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn fuzz_three_dimensional_distance() {
    const N: usize = 4;
    const N_GRIDS: usize = 300;
    let mut rng = StdRng::seed_from_u64(0);
    let start = Coord::from([0, 0, 0]);
    let end = Coord::from([N as i32 - 1; 3]);
    for _ in 0..N_GRIDS {
        let mut grid = random_grid(&[N, N, N], &mut rng, 0.3);
        grid.set(&start, false);
        grid.set(&end, false);
        let expected = brute_force_cost(&grid, &start, &end, Connectivity::Full);
        let result = Dijkstra::new().plan(&start, &end, &grid).unwrap();
        assert_eq!(result.success, expected.is_finite());
        if result.success {
            assert!((path_cost(&result.path) - expected).abs() < 1e-9);
        }
    }
}

#[test]
fn fuzz_all_planners_follow_grid() {
    const N: usize = 12;
    const N_GRIDS: usize = 40;
    let mut rng = StdRng::seed_from_u64(0);
    let planners = default_planners();
    for _ in 0..N_GRIDS {
        let mut grid = random_grid(&[N, N], &mut rng, 0.25);
        let start = Coord::from([rng.gen_range(0..N as i32), rng.gen_range(0..N as i32)]);
        let goal = Coord::from([rng.gen_range(0..N as i32), rng.gen_range(0..N as i32)]);
        grid.set(&start, false);
        grid.set(&goal, false);
        let connected = reachable(&grid, &start, &goal, Connectivity::Full);
        for named in &planners {
            let result = named.planner.plan(&start, &goal, &grid).unwrap();
            assert_followable(&grid, &start, &goal, &result, named.name);
            // Nothing can be found where no path exists.
            assert!(connected || !result.success, "{}", named.name);
        }
    }
}
