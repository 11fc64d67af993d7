use glam::Vec3;

const MIN_BOUND: f32 = 1.0e-6;
const MIN_CELL_SIZE: f32 = 1.0e-6;
const MAX_CELLS_PER_AXIS: usize = 64;
const INVALID_INDEX: usize = usize::MAX;

/// Linked-cell grid over the cage `[-half_extent, half_extent]³`.
///
/// Positions outside the cage are clamped into the border cells, which keeps
/// every pair closer than the cell size within one cell of each other.
pub struct NeighborGrid {
    cell_size: f32,
    half_extent: f32,
    cells_per_axis: usize,
    particle_count: usize,
    head: Vec<usize>,
    next: Vec<usize>,
    cached: Vec<Vec3>,
}

impl NeighborGrid {
    pub fn new(count: usize, half_extent: f32, cell_size: f32) -> Self {
        let mut grid = Self {
            cell_size: cell_size.max(MIN_CELL_SIZE),
            half_extent: half_extent.max(MIN_BOUND),
            cells_per_axis: 0,
            particle_count: 0,
            head: Vec::new(),
            next: Vec::new(),
            cached: Vec::new(),
        };

        grid.ensure_layout(count, grid.half_extent, grid.cell_size);
        grid
    }

    pub fn rebuild(&mut self, positions: &[Vec3], half_extent: f32, cell_size: f32) {
        let count = positions.len();
        self.ensure_layout(count, half_extent, cell_size);
        self.head.fill(INVALID_INDEX);

        if count == 0 {
            return;
        }

        self.cached.copy_from_slice(positions);
        for (i, &position) in positions.iter().enumerate() {
            let cell = self.cell_index(self.cell_coords(position));
            self.next[i] = self.head[cell];
            self.head[cell] = i;
        }
    }

    /// Visits every index stored in the cells overlapping the cube of
    /// half-size `radius` around entry `i`, including `i` itself.
    pub fn for_each_candidate<F>(&self, i: usize, radius: f32, mut callback: F)
    where
        F: FnMut(usize),
    {
        if i >= self.particle_count {
            return;
        }

        let cell_radius = (radius.max(0.0) / self.cell_size).ceil() as isize;
        let last = self.cells_per_axis as isize - 1;
        let [cx, cy, cz] = self.cell_coords(self.cached[i]);

        for z in (cz - cell_radius).max(0)..=(cz + cell_radius).min(last) {
            for y in (cy - cell_radius).max(0)..=(cy + cell_radius).min(last) {
                for x in (cx - cell_radius).max(0)..=(cx + cell_radius).min(last) {
                    let mut candidate = self.head[self.cell_index([x, y, z])];
                    while candidate != INVALID_INDEX {
                        callback(candidate);
                        candidate = self.next[candidate];
                    }
                }
            }
        }
    }

    fn ensure_layout(&mut self, count: usize, half_extent: f32, cell_size: f32) {
        self.half_extent = half_extent.max(MIN_BOUND);
        self.particle_count = count;

        let requested = cell_size.max(MIN_CELL_SIZE);
        let extent = self.half_extent * 2.0;
        let cells_per_axis = ((extent / requested).ceil() as usize).clamp(1, MAX_CELLS_PER_AXIS);
        // Coarsen the cells when the axis cap kicks in so they still tile the cage.
        self.cell_size = requested.max(extent / cells_per_axis as f32);

        if cells_per_axis != self.cells_per_axis {
            self.cells_per_axis = cells_per_axis;
            self.head = vec![INVALID_INDEX; cells_per_axis.pow(3)];
        }

        if self.next.len() != count {
            self.next.resize(count, INVALID_INDEX);
            self.cached.resize(count, Vec3::ZERO);
        }
    }

    fn cell_coords(&self, position: Vec3) -> [isize; 3] {
        [
            self.axis_cell(position.x),
            self.axis_cell(position.y),
            self.axis_cell(position.z),
        ]
    }

    fn axis_cell(&self, value: f32) -> isize {
        let last = self.cells_per_axis as isize - 1;
        (((value + self.half_extent) / self.cell_size).floor() as isize).clamp(0, last)
    }

    fn cell_index(&self, [x, y, z]: [isize; 3]) -> usize {
        let n = self.cells_per_axis;
        (z as usize * n + y as usize) * n + x as usize
    }
}
