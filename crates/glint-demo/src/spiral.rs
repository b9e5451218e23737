use std::f32::consts::TAU;

/// Primes up to and including `limit`.
pub fn primes(limit: u32) -> Vec<u32> {
    if limit < 2 {
        return Vec::new();
    }
    let n = limit as usize;
    let mut composite = vec![false; n + 1];
    let mut out = Vec::new();
    for i in 2..=n {
        if composite[i] {
            continue;
        }
        out.push(i as u32);
        let mut j = i * i;
        while j <= n {
            composite[j] = true;
            j += i;
        }
    }
    out
}

/// Sacks spiral: prime `p` sits at radius `sqrt(p)`, one turn per unit of
/// radius. Positions are scaled into the unit disc, z = 0.
pub fn sacks_points(limit: u32) -> Vec<[f32; 3]> {
    let scale = (limit.max(1) as f32).sqrt();
    primes(limit)
        .into_iter()
        .map(|p| {
            let r = (p as f32).sqrt();
            let theta = r * TAU;
            [r * theta.cos() / scale, r * theta.sin() / scale, 0.0]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sieve_finds_small_primes() {
        assert_eq!(primes(1), Vec::<u32>::new());
        assert_eq!(primes(30), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(primes(10_000).len(), 1229);
    }

    #[test]
    fn points_stay_inside_the_unit_disc() {
        let points = sacks_points(5_000);
        assert_eq!(points.len(), primes(5_000).len());
        assert!(points.iter().all(|[x, y, z]| x.hypot(*y) <= 1.0 + 1e-6 && *z == 0.0));
    }
}
