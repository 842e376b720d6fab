use std::collections::HashMap;

/// Chains triangles sharing edges into triangle strips.
/// Triangles are index triples with a consistent winding; strip triangle `k` is
/// `(s[k], s[k + 1], s[k + 2])` for even `k` and `(s[k + 1], s[k], s[k + 2])` for odd `k`,
/// so every triangle keeps its input winding.
#[derive(Debug, Default)]
pub struct StripBuilder {
    triangles: Vec<[usize; 3]>,
    /// directed edge to the triangle holding it
    edges: HashMap<(usize, usize), usize>,
    used: Vec<bool>,
}

impl StripBuilder {
    pub fn new(triangles: Vec<[usize; 3]>) -> Self {
        let mut edges = HashMap::with_capacity(triangles.len() * 3);
        for (i, [a, b, c]) in triangles.iter().enumerate() {
            edges.insert((*a, *b), i);
            edges.insert((*b, *c), i);
            edges.insert((*c, *a), i);
        }
        let used = vec![false; triangles.len()];
        Self {
            triangles,
            edges,
            used,
        }
    }

    /// Unused triangle holding the directed edge `a -> b` and its third vertex
    fn neighbor(&self, a: usize, b: usize) -> Option<(usize, usize)> {
        let t = *self.edges.get(&(a, b))?;
        if self.used[t] {
            return None;
        }
        let tri = self.triangles[t];
        tri.iter()
            .find(|v| **v != a && **v != b)
            .map(|third| (t, *third))
    }

    /// Append triangles to the end of the strip while a neighbor continues it
    fn extend(&self, strip: &mut Vec<usize>, taken: &mut Vec<usize>) {
        loop {
            let n = strip.len();
            let (a, b) = if n % 2 == 1 {
                (strip[n - 1], strip[n - 2])
            } else {
                (strip[n - 2], strip[n - 1])
            };
            match self.neighbor(a, b) {
                Some((t, third)) if !taken.contains(&t) => {
                    taken.push(t);
                    strip.push(third);
                }
                _ => break,
            }
        }
    }

    /// Strip grown from `seed` in both directions without consuming any triangle
    fn grow(&self, seed: usize, rotation: usize) -> Vec<usize> {
        let tri = self.triangles[seed];
        let mut strip = vec![
            tri[rotation % 3],
            tri[(rotation + 1) % 3],
            tri[(rotation + 2) % 3],
        ];
        let mut taken = vec![seed];
        self.extend(&mut strip, &mut taken);
        // reversing keeps every winding only for an even vertex count
        if strip.len() % 2 == 0 {
            strip.reverse();
            self.extend(&mut strip, &mut taken);
        }
        strip
    }

    fn consume(&mut self, strip: &[usize]) {
        for k in 2..strip.len() {
            let (a, b) = if k % 2 == 0 {
                (strip[k - 2], strip[k - 1])
            } else {
                (strip[k - 1], strip[k - 2])
            };
            if let Some(t) = self.edges.get(&(a, b)) {
                self.used[*t] = true;
            }
        }
    }

    /// Greedily extract strips until every triangle is covered
    pub fn build(mut self) -> Vec<Vec<usize>> {
        let mut strips = vec![];
        for seed in 0..self.triangles.len() {
            if self.used[seed] {
                continue;
            }
            let strip = (0..3)
                .map(|rotation| self.grow(seed, rotation))
                .max_by_key(|s| s.len())
                .unwrap_or_default();
            self.used[seed] = true;
            self.consume(&strip);
            strips.push(strip);
        }
        strips
    }
}

/// Convenience wrapper around [`StripBuilder`]
pub fn build_strips(triangles: Vec<[usize; 3]>) -> Vec<Vec<usize>> {
    StripBuilder::new(triangles).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_triangles(strip: &[usize]) -> Vec<[usize; 3]> {
        (2..strip.len())
            .map(|k| {
                if k % 2 == 0 {
                    [strip[k - 2], strip[k - 1], strip[k]]
                } else {
                    [strip[k - 1], strip[k - 2], strip[k]]
                }
            })
            .collect()
    }

    fn normalized(tri: [usize; 3]) -> [usize; 3] {
        let k = (0..3).min_by_key(|i| tri[*i]).unwrap_or(0);
        [tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]]
    }

    #[test]
    fn quad_row_becomes_one_strip() {
        // 0 - 1 - 2 - 3 on the bottom, 4 - 5 - 6 - 7 on the top
        let mut triangles = vec![];
        for i in 0..3 {
            triangles.push([i, i + 1, i + 5]);
            triangles.push([i, i + 5, i + 4]);
        }
        let strips = build_strips(triangles.clone());
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0].len(), 8);

        let mut expected: Vec<_> = triangles.into_iter().map(normalized).collect();
        let mut actual: Vec<_> = strip_triangles(&strips[0]).into_iter().map(normalized).collect();
        expected.sort();
        actual.sort();
        assert_eq!(expected, actual);
    }

    #[test]
    fn every_triangle_is_covered_once() {
        // fan around vertex 0
        let triangles = vec![[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 4, 5], [0, 5, 1]];
        let strips = build_strips(triangles.clone());
        let mut covered: Vec<_> = strips
            .iter()
            .flat_map(|s| strip_triangles(s))
            .map(normalized)
            .collect();
        covered.sort();
        let mut expected: Vec<_> = triangles.into_iter().map(normalized).collect();
        expected.sort();
        assert_eq!(covered, expected);
    }
}
