//! Density clustering over unit vectors by cosine distance.
//!
//! A point is a core point when at least `min_points` points (itself
//! included) lie within distance ε of it. Clusters are connected components
//! of core points; non-core points within ε of a core point attach to that
//! core's cluster. A point reachable from several clusters goes to the one
//! with the nearest core centroid, and exact ties go to the cluster whose
//! smallest member id sorts first — assignment is fully deterministic and
//! invariant under input permutation.

/// Cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors yield 0.0 rather than NaN.
///
/// # Examples
///
/// ```
/// use talkless_group::cluster::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
/// assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        0.0
    } else {
        dot_product / (magnitude_a * magnitude_b)
    }
}

/// Cosine distance `1 − cos(u, v)`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - f64::from(cosine_similarity(a, b))
}

/// Unit-normalized mean of a set of vectors.
pub fn centroid(vectors: &[&[f32]]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0f32; first.len()];
    for v in vectors {
        for (m, x) in mean.iter_mut().zip(v.iter()) {
            *m += x;
        }
    }
    let count = vectors.len() as f32;
    for m in &mut mean {
        *m /= count;
    }
    let magnitude: f32 = mean.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for m in &mut mean {
            *m /= magnitude;
        }
    }
    mean
}

/// Clustering parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// Neighborhood radius in cosine distance (`1 − similarity_threshold`).
    pub epsilon: f64,
    /// Minimum neighborhood size (self included) for a core point, and the
    /// minimum surviving cluster size.
    pub min_points: usize,
    /// Clusters larger than this keep only the members closest to the
    /// centroid; overflow becomes noise.
    pub max_size: usize,
}

/// Result of a clustering pass: member indices per cluster, plus noise.
#[derive(Debug, Clone)]
pub struct Clustering {
    /// Clusters as index lists into the input, each sorted by id.
    pub clusters: Vec<Vec<usize>>,
    /// Input indices that belong to no cluster.
    pub noise: Vec<usize>,
}

/// Cluster `vectors` (parallel to `ids`) by density.
///
/// `ids` provide the deterministic ordering; the result depends only on the
/// id/vector pairs, not on their input order.
pub fn density_cluster(ids: &[String], vectors: &[Vec<f32>], params: &ClusterParams) -> Clustering {
    let n = ids.len();
    debug_assert_eq!(n, vectors.len());
    if n == 0 {
        return Clustering {
            clusters: Vec::new(),
            noise: Vec::new(),
        };
    }

    // Process in ascending id order so the outcome is permutation-invariant.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| ids[a].cmp(&ids[b]));

    // Neighborhoods (excluding self).
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (pos, &i) in order.iter().enumerate() {
        for &j in order.iter().skip(pos + 1) {
            if cosine_distance(&vectors[i], &vectors[j]) <= params.epsilon {
                neighbors[i].push(j);
                neighbors[j].push(i);
            }
        }
    }

    let is_core: Vec<bool> = (0..n)
        .map(|i| neighbors[i].len() + 1 >= params.min_points)
        .collect();

    // Clusters are connected components of core points.
    const UNASSIGNED: usize = usize::MAX;
    let mut assignment = vec![UNASSIGNED; n];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for &seed in &order {
        if !is_core[seed] || assignment[seed] != UNASSIGNED {
            continue;
        }
        let cluster_index = clusters.len();
        let mut members = Vec::new();
        let mut queue = vec![seed];
        assignment[seed] = cluster_index;
        while let Some(current) = queue.pop() {
            members.push(current);
            for &next in &neighbors[current] {
                if is_core[next] && assignment[next] == UNASSIGNED {
                    assignment[next] = cluster_index;
                    queue.push(next);
                }
            }
        }
        members.sort_by(|&a, &b| ids[a].cmp(&ids[b]));
        clusters.push(members);
    }

    // Core centroids, for border tie-breaking.
    let core_centroids: Vec<Vec<f32>> = clusters
        .iter()
        .map(|members| {
            let vecs: Vec<&[f32]> = members.iter().map(|&i| vectors[i].as_slice()).collect();
            centroid(&vecs)
        })
        .collect();

    // Attach border points: non-core points within ε of at least one core.
    for &i in &order {
        if is_core[i] || assignment[i] != UNASSIGNED {
            continue;
        }
        let mut candidates: Vec<usize> = neighbors[i]
            .iter()
            .filter(|&&j| is_core[j])
            .map(|&j| assignment[j])
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        if candidates.is_empty() {
            continue;
        }

        let min_id = |cluster: &[usize]| -> &String {
            cluster
                .iter()
                .map(|&member| &ids[member])
                .min()
                .expect("clusters are never empty")
        };
        let chosen = candidates
            .into_iter()
            .min_by(|&a, &b| {
                let da = cosine_distance(&vectors[i], &core_centroids[a]);
                let db = cosine_distance(&vectors[i], &core_centroids[b]);
                da.partial_cmp(&db)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| min_id(&clusters[a]).cmp(min_id(&clusters[b])))
            })
            .expect("candidates checked non-empty");
        assignment[i] = chosen;
        clusters[chosen].push(i);
    }

    for members in &mut clusters {
        members.sort_by(|&a, &b| ids[a].cmp(&ids[b]));
    }

    // Size cap: keep the members nearest the full centroid, demote the rest.
    let mut demoted: Vec<usize> = Vec::new();
    for members in &mut clusters {
        if members.len() <= params.max_size {
            continue;
        }
        let vecs: Vec<&[f32]> = members.iter().map(|&i| vectors[i].as_slice()).collect();
        let center = centroid(&vecs);
        let mut ranked: Vec<usize> = members.clone();
        ranked.sort_by(|&a, &b| {
            cosine_distance(&vectors[a], &center)
                .partial_cmp(&cosine_distance(&vectors[b], &center))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ids[a].cmp(&ids[b]))
        });
        let overflow = ranked.split_off(params.max_size);
        demoted.extend(overflow);
        ranked.sort_by(|&a, &b| ids[a].cmp(&ids[b]));
        *members = ranked;
    }

    // Clusters that fell below the minimum no longer qualify as groups.
    let mut kept = Vec::new();
    for members in clusters {
        if members.len() >= params.min_points {
            kept.push(members);
        } else {
            demoted.extend(members);
        }
    }

    let mut noise: Vec<usize> = (0..n)
        .filter(|&i| assignment[i] == UNASSIGNED)
        .chain(demoted)
        .collect();
    noise.sort_by(|&a, &b| ids[a].cmp(&ids[b]));
    noise.dedup();

    Clustering {
        clusters: kept,
        noise,
    }
}
