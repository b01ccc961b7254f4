#[cfg(test)]
mod tests {
    use hashlife_universe::*;
    use proptest::prelude::*;

    const SEED: u64 = 42;
    const GLIDER: [(i32, i32); 5] = [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)];

    fn load(cells: &[(i32, i32)]) -> Universe {
        let mut universe = Universe::new();
        universe.load_pattern(&Pattern::from_cells(cells)).unwrap();
        universe
    }

    fn soup(size: u32, config: UniverseConfig) -> Universe {
        let mut universe = Universe::with_config(config).unwrap();
        let pattern = Pattern::random(size, size, 0.4, Some(SEED));
        universe.load_pattern(&pattern).unwrap();
        universe
    }

    fn sorted(cells: impl IntoIterator<Item = (i32, i32)>) -> Vec<(i64, i64)> {
        let mut cells: Vec<_> = cells
            .into_iter()
            .map(|(x, y)| (x as i64, y as i64))
            .collect();
        cells.sort_unstable_by_key(|&(x, y)| (y, x));
        cells
    }

    /// Checks that every population is the sum of its children's.
    fn assert_populations_add_up(universe: &Universe, id: NodeId) -> Number {
        let node = universe.node(id);
        if node.is_leaf() || node.population().is_zero() {
            return node.population().clone();
        }
        let sum: Number = node
            .parts()
            .into_iter()
            .map(|child| assert_populations_add_up(universe, child))
            .sum();
        assert_eq!(&sum, node.population(), "level {}", node.level());
        sum
    }

    #[test]
    fn test_equal_squares_share_a_node() {
        // the same shape at the same offset inside the nw and se quadrants
        let universe = load(&[(-8, -8), (-7, -6), (0, 0), (1, 2)]);
        let root = universe.node(universe.root());
        assert_eq!(root.nw(), root.se());
        assert_ne!(root.nw(), root.ne());
        assert_eq!(root.ne(), root.sw());
    }

    #[test]
    fn test_population_additivity() {
        let mut universe = soup(64, UniverseConfig::default());
        assert_populations_add_up(&universe, universe.root());
        universe.set_step(3);
        universe.advance().unwrap();
        let total = assert_populations_add_up(&universe, universe.root());
        assert_eq!(total, universe.population());
    }

    #[test]
    fn test_empty_pattern() {
        let mut universe = Universe::new();
        universe.new_life(&[], &[]).unwrap();
        assert_eq!(universe.population(), Number::ZERO);
        assert_eq!(universe.root_bounds(), Bounds::default());
        assert_eq!(universe.level(), MIN_ROOT_LEVEL);

        universe.set_step(5);
        universe.advance().unwrap();
        assert_eq!(universe.population(), Number::ZERO);
        assert_eq!(universe.generation(), &Number::from(32));
        assert_eq!(universe.live_cells().unwrap(), vec![]);
    }

    #[test]
    fn test_block_is_still() {
        let block = [(0, 0), (1, 0), (0, 1), (1, 1)];
        let mut universe = load(&block);
        for step in [0, 1, 4, 9] {
            universe.set_step(step);
            universe.advance().unwrap();
            assert_eq!(universe.live_cells().unwrap(), sorted(block));
            assert_eq!(
                universe.root_bounds(),
                Bounds::new(0.into(), 0.into(), 1.into(), 1.into())
            );
        }
        assert_eq!(universe.generation(), &Number::from(1 + 2 + 16 + 512));
    }

    #[test]
    fn test_blinker_oscillates() {
        let horizontal = [(-1, 0), (0, 0), (1, 0)];
        let vertical = [(0, -1), (0, 0), (0, 1)];
        let mut universe = load(&horizontal);
        universe.advance().unwrap();
        assert_eq!(universe.live_cells().unwrap(), sorted(vertical));
        universe.advance().unwrap();
        assert_eq!(universe.live_cells().unwrap(), sorted(horizontal));

        // an even number of generations brings it back
        universe.set_step(3);
        universe.advance().unwrap();
        assert_eq!(universe.live_cells().unwrap(), sorted(horizontal));
        assert_eq!(universe.generation(), &Number::from(10));
    }

    #[test]
    fn test_glider_moves() {
        let mut universe = load(&GLIDER);
        for _ in 0..4 {
            universe.advance().unwrap();
        }
        assert_eq!(universe.population(), Number::from(5));
        assert_eq!(
            universe.live_cells().unwrap(),
            sorted(GLIDER.map(|(x, y)| (x + 1, y + 1)))
        );
        assert_eq!(
            universe.root_bounds(),
            Bounds::new(1.into(), 1.into(), 3.into(), 3.into())
        );
    }

    #[test]
    fn test_glider_moves_far() {
        let mut universe = load(&GLIDER);
        universe.set_step(10);
        universe.advance().unwrap();
        assert_eq!(universe.generation(), &Number::from(1024));
        assert_eq!(
            universe.live_cells().unwrap(),
            sorted(GLIDER.map(|(x, y)| (x + 256, y + 256)))
        );
    }

    #[test]
    fn test_step_equivalence() {
        let mut one_by_one = soup(32, UniverseConfig::default());
        let mut at_once = soup(32, UniverseConfig::default());
        for _ in 0..4 {
            one_by_one.advance().unwrap();
        }
        at_once.set_step(2);
        at_once.advance().unwrap();

        assert_eq!(one_by_one.generation(), at_once.generation());
        assert_eq!(one_by_one.population(), at_once.population());
        assert_eq!(one_by_one.root_bounds(), at_once.root_bounds());
        assert_eq!(one_by_one.live_cells().unwrap(), at_once.live_cells().unwrap());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut sequential = soup(64, UniverseConfig::default());
        let parallel_config = UniverseConfig::default()
            .with_workers(4)
            .with_spawn_threshold(1, 3);
        let mut parallel = soup(64, parallel_config);
        for step in [5, 0, 3] {
            sequential.set_step(step);
            parallel.set_step(step);
            sequential.advance().unwrap();
            parallel.advance().unwrap();
            assert_eq!(sequential.live_cells().unwrap(), parallel.live_cells().unwrap());
        }
    }

    #[test]
    fn test_gc_preserves_content() {
        let mut universe = soup(48, UniverseConfig::default());
        universe.set_step(4);
        universe.advance().unwrap();
        let cells = universe.live_cells().unwrap();
        let bounds = universe.root_bounds();
        let population = universe.population();

        universe.run_gc();
        assert_eq!(universe.live_cells().unwrap(), cells);
        assert_eq!(universe.root_bounds(), bounds);
        assert_eq!(universe.population(), population);

        // memoized results that survived must still be right
        let mut fresh = soup(48, UniverseConfig::default());
        fresh.set_step(4);
        fresh.advance().unwrap();
        universe.advance().unwrap();
        fresh.advance().unwrap();
        assert_eq!(universe.live_cells().unwrap(), fresh.live_cells().unwrap());
    }

    #[test]
    fn test_small_table_grows() {
        let tiny = UniverseConfig::default().with_capacity_log2(4, 20);
        let mut small = soup(48, tiny);
        let mut large = soup(48, UniverseConfig::default());
        for universe in [&mut small, &mut large] {
            universe.set_step(6);
            universe.advance().unwrap();
        }
        assert!(small.capacity_log2() > 4);
        assert_eq!(small.live_cells().unwrap(), large.live_cells().unwrap());
    }

    #[test]
    fn test_table_full_leaves_universe_unchanged() {
        let config = UniverseConfig::default().with_capacity_log2(4, 4);
        let mut universe = Universe::with_config(config).unwrap();
        universe.load_pattern(&Pattern::from_cells(&GLIDER)).unwrap();
        universe.set_step(6);
        assert_eq!(
            universe.advance(),
            Err(Error::TableFull { capacity_log2: 4 })
        );
        assert_eq!(universe.generation(), &Number::ZERO);
        assert_eq!(universe.live_cells().unwrap(), sorted(GLIDER));
    }

    #[test]
    fn test_huge_coordinates() {
        let mut universe = Universe::new();
        universe.set_cell(i64::MAX, i64::MIN, true).unwrap();
        universe.set_cell(-3, 5, true).unwrap();
        assert_eq!(universe.level(), 64);
        assert!(universe.get_cell(i64::MAX, i64::MIN));
        assert_eq!(
            universe.root_bounds(),
            Bounds::new(i64::MIN.into(), (-3).into(), 5.into(), i64::MAX.into())
        );
        assert_eq!(
            universe.live_cells().unwrap(),
            vec![(i64::MAX, i64::MIN), (-3, 5)]
        );
        let width = universe.root_bounds().width();
        assert_eq!(width.to_bigint(), BigInt::from(i64::MAX) + 4);
    }

    #[test]
    fn test_rule_change() {
        // two parallel rows of three: the cell between them is born only under B36/S23
        let cells = [(0, 0), (1, 0), (2, 0), (0, 2), (1, 2), (2, 2)];
        let mut life = load(&cells);
        let mut highlife = load(&cells);
        highlife.set_rule("B36/S23".parse().unwrap());
        life.advance().unwrap();
        highlife.advance().unwrap();
        // (1, 1) has six neighbours
        assert!(!life.get_cell(1, 1));
        assert!(highlife.get_cell(1, 1));
    }

    proptest! {
        #[test]
        fn test_bounds_roundtrip(
            cells in prop::collection::vec((-1000i32..1000, -1000i32..1000), 1..40)
        ) {
            let universe = load(&cells);
            let (xs, ys): (Vec<i32>, Vec<i32>) = cells.iter().copied().unzip();
            prop_assert_eq!(Some(universe.root_bounds()), Bounds::from_cells(&xs, &ys));
        }

        #[test]
        fn test_cells_roundtrip(
            cells in prop::collection::vec((-300i32..300, -300i32..300), 0..40)
        ) {
            let universe = load(&cells);
            let mut expected = sorted(cells.iter().copied());
            expected.dedup();
            prop_assert_eq!(universe.live_cells().unwrap(), expected);
        }
    }
}
