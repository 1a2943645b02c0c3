use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The terrain grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    pub width: usize,
    pub depth: usize,
    /// Edge length of one square cell in world units
    pub cell_size: f32,
    pub cells: Vec<Vec<Cell>>,
}

/// A single cell of ground
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellKind,
    /// Flat ground height across the cell
    pub elevation: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CellKind {
    /// Open buildable ground
    Plains,
    Forest,
    /// Boulders and cliffs
    Rock,
    Water,
    Road,
    Rail,
    /// Monument grounds
    Landmark,
    /// Building blocked, e.g. around safe zones
    NoBuild,
}

impl Terrain {
    /// Every cell the same kind and height
    pub fn uniform(width: usize, depth: usize, cell_size: f32, elevation: f32, kind: CellKind) -> Self {
        Self {
            width,
            depth,
            cell_size,
            cells: vec![vec![Cell { kind, elevation }; width]; depth],
        }
    }

    /// Random island: rolling hills, mostly plains and forest
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, width: usize, depth: usize, cell_size: f32) -> Self {
        let phase_x: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let phase_z: f32 = rng.gen_range(0.0..std::f32::consts::TAU);

        let mut cells = Vec::with_capacity(depth);
        for z in 0..depth {
            let mut row = Vec::with_capacity(width);
            for x in 0..width {
                let elevation = 20.0
                    + 6.0 * (x as f32 * 0.15 + phase_x).sin()
                    + 4.0 * (z as f32 * 0.11 + phase_z).cos();

                let roll: f64 = rng.gen_range(0.0..1.0);
                let kind = if roll < 0.55 {
                    CellKind::Plains
                } else if roll < 0.80 {
                    CellKind::Forest
                } else if roll < 0.88 {
                    CellKind::Rock
                } else if roll < 0.94 {
                    CellKind::Water
                } else if roll < 0.96 {
                    CellKind::Road
                } else if roll < 0.97 {
                    CellKind::Rail
                } else if roll < 0.99 {
                    CellKind::Landmark
                } else {
                    CellKind::NoBuild
                };

                row.push(Cell { kind, elevation });
            }
            cells.push(row);
        }

        Self {
            width,
            depth,
            cell_size,
            cells,
        }
    }

    /// Get a cell at grid coordinates
    pub fn get(&self, x: usize, z: usize) -> Option<&Cell> {
        self.cells.get(z).and_then(|row| row.get(x))
    }

    /// Get a mutable cell at grid coordinates
    pub fn get_mut(&mut self, x: usize, z: usize) -> Option<&mut Cell> {
        self.cells.get_mut(z).and_then(|row| row.get_mut(x))
    }

    /// Grid coordinates of the cell under `point`
    pub fn index_of(&self, point: Vec3) -> Option<(usize, usize)> {
        if point.x < 0.0 || point.z < 0.0 {
            return None;
        }
        let x = (point.x / self.cell_size) as usize;
        let z = (point.z / self.cell_size) as usize;
        (x < self.width && z < self.depth).then_some((x, z))
    }

    pub fn cell_at(&self, point: Vec3) -> Option<&Cell> {
        self.index_of(point).and_then(|(x, z)| self.get(x, z))
    }

    /// Ground height under `point`, 0 off the map
    pub fn height_at(&self, point: Vec3) -> f32 {
        self.cell_at(point).map_or(0.0, |c| c.elevation)
    }

    /// Change the kind of a rectangle of cells, clamped to the grid
    pub fn paint(&mut self, x: std::ops::Range<usize>, z: std::ops::Range<usize>, kind: CellKind) {
        for zi in z.start..z.end.min(self.depth) {
            for xi in x.start..x.end.min(self.width) {
                if let Some(cell) = self.get_mut(xi, zi) {
                    cell.kind = kind;
                }
            }
        }
    }

    /// Cells whose square overlaps the horizontal rectangle `min..max`
    pub fn cells_in(&self, min: Vec3, max: Vec3) -> impl Iterator<Item = &Cell> + '_ {
        let to_index = |v: f32, len: usize| ((v / self.cell_size).floor().max(0.0) as usize).min(len);
        let x0 = to_index(min.x, self.width);
        let x1 = to_index(max.x, self.width.saturating_sub(1)) + 1;
        let z0 = to_index(min.z, self.depth);
        let z1 = to_index(max.z, self.depth.saturating_sub(1)) + 1;
        let inside = max.x >= 0.0 && max.z >= 0.0;

        (z0..z1)
            .filter(move |_| inside)
            .flat_map(move |z| (x0..x1).filter_map(move |x| self.get(x, z)))
    }

    /// Count of each cell kind
    pub fn census(&self) -> Vec<(CellKind, usize)> {
        let mut counts: Vec<(CellKind, usize)> = Vec::new();
        for cell in self.cells.iter().flatten() {
            match counts.iter_mut().find(|(k, _)| *k == cell.kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((cell.kind, 1)),
            }
        }
        counts
    }
}
