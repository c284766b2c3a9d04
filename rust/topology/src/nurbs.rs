// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! NURBS curve and surface geometry carried by edges and faces.
//!
//! Control points are stored homogeneously as `Vector4` (`w = 1` for
//! non-rational geometry). Curves bound to a parametric face live in that
//! face's (u, v) space; curves bound to a planar face live in model space.
//!
//! Evaluation follows the Cox–de Boor recurrence; refinement inserts knots
//! one at a time with Boehm's algorithm, which leaves the shape unchanged
//! while densifying the control net.

use nalgebra::{Point3, Vector3, Vector4};

use crate::error::{Error, Result};

/// Space in which control points are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PointSpace {
    /// (x, y, z[, w]) model coordinates.
    Model,
    /// (u, v[, w]) coordinates on the owning surface.
    Parametric,
}

/// A non-decreasing knot vector.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KnotVector {
    knots: Vec<f64>,
}

impl KnotVector {
    /// Wraps a knot list. Returns an error if it decreases anywhere.
    pub fn new(knots: Vec<f64>) -> Result<Self> {
        if knots.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidNurb("knot vector must be non-decreasing".into()));
        }
        Ok(Self { knots })
    }

    /// Clamped uniform knot vector over [0, 1] for `n_ctrl` points of the
    /// given order.
    pub fn clamped_uniform(order: usize, n_ctrl: usize) -> Result<Self> {
        if order == 0 || n_ctrl < order {
            return Err(Error::InvalidNurb(format!(
                "need at least {order} control points for order {order}"
            )));
        }
        let m = n_ctrl + order;
        let mut knots = vec![0.0; m];
        for k in knots.iter_mut().skip(m - order) {
            *k = 1.0;
        }
        let n_interior = n_ctrl - order;
        for i in 1..=n_interior {
            knots[order - 1 + i] = i as f64 / (n_interior + 1) as f64;
        }
        Ok(Self { knots })
    }

    /// `n` knots evenly spaced strictly inside `(lower, upper)`.
    pub fn uniform_interior(lower: f64, upper: f64, n: usize) -> Self {
        let delta = (upper - lower) / (n + 1) as f64;
        Self {
            knots: (1..=n).map(|i| lower + delta * i as f64).collect(),
        }
    }

    /// Sorted merge of two knot vectors, keeping every knot of both.
    pub fn merge(&self, other: &KnotVector) -> KnotVector {
        let (a, b) = (&self.knots, &other.knots);
        let mut merged = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() || j < b.len() {
            if j >= b.len() || (i < a.len() && a[i] < b[j]) {
                merged.push(a[i]);
                i += 1;
            } else {
                merged.push(b[j]);
                j += 1;
            }
        }
        KnotVector { knots: merged }
    }

    /// Knots of `self` that are not already in `base`, counting
    /// multiplicity. `self` must contain every knot of `base`.
    fn difference(&self, base: &KnotVector) -> Vec<f64> {
        let mut extra = Vec::new();
        let mut j = 0;
        for &k in &self.knots {
            if j < base.knots.len() && base.knots[j] == k {
                j += 1;
            } else {
                extra.push(k);
            }
        }
        extra
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.knots
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    /// First knot value.
    pub fn first(&self) -> f64 {
        self.knots.first().copied().unwrap_or(0.0)
    }

    /// Last knot value.
    pub fn last(&self) -> f64 {
        self.knots.last().copied().unwrap_or(0.0)
    }
}

/// Finds the knot span such that `knots[span] <= u < knots[span + 1]`.
///
/// `n` is the index of the last control point, `p` the degree.
fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }

    let mut lo = p;
    let mut hi = n + 1;
    let mut mid = (lo + hi) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            hi = mid;
        } else {
            lo = mid;
        }
        mid = (lo + hi) / 2;
    }
    mid
}

/// The `p + 1` non-zero basis functions at `u` for the given span.
fn basis_funs(span: usize, u: f64, p: usize, knots: &[f64]) -> Vec<f64> {
    let mut n = vec![0.0; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    n[0] = 1.0;

    for j in 1..=p {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = n[r] / (right[r + 1] + left[j - r]);
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }
    n
}

/// Evaluates the homogeneous B-spline through `pts` at `u`.
fn eval_homogeneous(order: usize, knots: &[f64], pts: &[Vector4<f64>], u: f64) -> Vector4<f64> {
    let p = order - 1;
    let n = pts.len() - 1;
    let span = find_span(n, p, u, knots);
    let basis = basis_funs(span, u, p, knots);

    let mut out = Vector4::zeros();
    for (j, b) in basis.iter().enumerate() {
        out += pts[span - p + j] * *b;
    }
    out
}

/// Inserts knot `u` once, returning the new knots and control points.
fn insert_knot(order: usize, knots: &[f64], pts: &[Vector4<f64>], u: f64) -> (Vec<f64>, Vec<Vector4<f64>>) {
    let p = order - 1;
    let n = pts.len() - 1;
    let k = find_span(n, p, u, knots);

    let mut new_knots = Vec::with_capacity(knots.len() + 1);
    new_knots.extend_from_slice(&knots[..=k]);
    new_knots.push(u);
    new_knots.extend_from_slice(&knots[k + 1..]);

    let mut new_pts = Vec::with_capacity(pts.len() + 1);
    new_pts.extend_from_slice(&pts[..=(k - p)]);
    for i in (k - p + 1)..=k {
        let alpha = (u - knots[i]) / (knots[i + p] - knots[i]);
        new_pts.push(pts[i - 1] * (1.0 - alpha) + pts[i] * alpha);
    }
    new_pts.extend_from_slice(&pts[k..]);

    (new_knots, new_pts)
}

/// Converts a homogeneous point to Euclidean (x, y, z).
pub fn dehomogenize(h: &Vector4<f64>, rational: bool) -> Point3<f64> {
    if rational && h.w != 0.0 {
        let inv = 1.0 / h.w;
        Point3::new(h.x * inv, h.y * inv, h.z * inv)
    } else {
        Point3::new(h.x, h.y, h.z)
    }
}

/// A trimmed parametric curve (a "cnurb").
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NurbCurve {
    pub order: usize,
    pub knots: KnotVector,
    pub ctl_points: Vec<Vector4<f64>>,
    pub rational: bool,
    pub space: PointSpace,
}

impl NurbCurve {
    pub fn new(
        order: usize,
        knots: KnotVector,
        ctl_points: Vec<Vector4<f64>>,
        rational: bool,
        space: PointSpace,
    ) -> Result<Self> {
        if order == 0 {
            return Err(Error::InvalidNurb("order must be at least 1".into()));
        }
        if ctl_points.len() < order {
            return Err(Error::InvalidNurb(format!(
                "{} control points cannot carry order {order}",
                ctl_points.len()
            )));
        }
        if knots.len() != ctl_points.len() + order {
            return Err(Error::InvalidNurb(format!(
                "expected {} knots, got {}",
                ctl_points.len() + order,
                knots.len()
            )));
        }
        Ok(Self {
            order,
            knots,
            ctl_points,
            rational,
            space,
        })
    }

    /// Parameter range covered by the knot vector.
    pub fn domain(&self) -> (f64, f64) {
        (self.knots.first(), self.knots.last())
    }

    /// Homogeneous curve point at `u`.
    pub fn evaluate_homogeneous(&self, u: f64) -> Vector4<f64> {
        eval_homogeneous(self.order, self.knots.as_slice(), &self.ctl_points, u)
    }

    /// Curve point at `u`.
    ///
    /// In parametric space the result is `(u, v, 0)` with any weight
    /// divided out.
    pub fn evaluate(&self, u: f64) -> Point3<f64> {
        let h = self.evaluate_homogeneous(u);
        let p = dehomogenize(&h, self.rational);
        match self.space {
            PointSpace::Model => p,
            PointSpace::Parametric => Point3::new(p.x, p.y, 0.0),
        }
    }

    /// `n` parameter values evenly spaced strictly inside the domain.
    pub fn interior_params(&self, n: usize) -> Vec<f64> {
        let (lo, hi) = self.domain();
        KnotVector::uniform_interior(lo, hi, n).knots
    }

    /// Returns an equivalent curve whose knot vector is `tau`, which must be
    /// a superset of the current knots.
    pub fn refine(&self, tau: &KnotVector) -> NurbCurve {
        let mut knots = self.knots.knots.clone();
        let mut pts = self.ctl_points.clone();
        for u in tau.difference(&self.knots) {
            let (k, p) = insert_knot(self.order, &knots, &pts, u);
            knots = k;
            pts = p;
        }
        NurbCurve {
            order: self.order,
            knots: KnotVector { knots },
            ctl_points: pts,
            rational: self.rational,
            space: self.space,
        }
    }
}

/// A parametric surface (a "snurb").
///
/// Control points are stored row-major: `rows` rows along v, each holding
/// `cols` points along u.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NurbSurface {
    pub u_order: usize,
    pub v_order: usize,
    pub u_knots: KnotVector,
    pub v_knots: KnotVector,
    pub rows: usize,
    pub cols: usize,
    pub ctl_points: Vec<Vector4<f64>>,
    pub rational: bool,
}

impl NurbSurface {
    pub fn new(
        u_order: usize,
        v_order: usize,
        u_knots: KnotVector,
        v_knots: KnotVector,
        rows: usize,
        cols: usize,
        ctl_points: Vec<Vector4<f64>>,
        rational: bool,
    ) -> Result<Self> {
        if u_order == 0 || v_order == 0 {
            return Err(Error::InvalidNurb("order must be at least 1".into()));
        }
        if ctl_points.len() != rows * cols {
            return Err(Error::InvalidNurb(format!(
                "{rows}x{cols} net needs {} control points, got {}",
                rows * cols,
                ctl_points.len()
            )));
        }
        if cols < u_order || rows < v_order {
            return Err(Error::InvalidNurb("control net smaller than order".into()));
        }
        if u_knots.len() != cols + u_order || v_knots.len() != rows + v_order {
            return Err(Error::InvalidNurb("knot vector length does not match control net".into()));
        }
        Ok(Self {
            u_order,
            v_order,
            u_knots,
            v_knots,
            rows,
            cols,
            ctl_points,
            rational,
        })
    }

    /// Control point at (row, col).
    pub fn ctl_point(&self, row: usize, col: usize) -> &Vector4<f64> {
        &self.ctl_points[row * self.cols + col]
    }

    fn row(&self, row: usize) -> Vec<Vector4<f64>> {
        self.ctl_points[row * self.cols..(row + 1) * self.cols].to_vec()
    }

    fn column(&self, col: usize) -> Vec<Vector4<f64>> {
        (0..self.rows).map(|r| *self.ctl_point(r, col)).collect()
    }

    /// Parameter ranges `((u0, u1), (v0, v1))`.
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.u_knots.first(), self.u_knots.last()),
            (self.v_knots.first(), self.v_knots.last()),
        )
    }

    /// Homogeneous surface point at (u, v).
    pub fn evaluate_homogeneous(&self, u: f64, v: f64) -> Vector4<f64> {
        let column: Vec<Vector4<f64>> = (0..self.rows)
            .map(|r| eval_homogeneous(self.u_order, self.u_knots.as_slice(), &self.row(r), u))
            .collect();
        eval_homogeneous(self.v_order, self.v_knots.as_slice(), &column, v)
    }

    /// Surface point at (u, v) in model space.
    pub fn evaluate(&self, u: f64, v: f64) -> Point3<f64> {
        dehomogenize(&self.evaluate_homogeneous(u, v), self.rational)
    }

    /// Unit surface normal at (u, v), from central differences of the
    /// surface point. Returns `None` where the surface is degenerate.
    pub fn normal(&self, u: f64, v: f64) -> Option<Vector3<f64>> {
        let ((u0, u1), (v0, v1)) = self.domain();
        let hu = (u1 - u0) * 1e-6;
        let hv = (v1 - v0) * 1e-6;
        let (ua, ub) = ((u - hu).max(u0), (u + hu).min(u1));
        let (va, vb) = ((v - hv).max(v0), (v + hv).min(v1));

        let du = (self.evaluate(ub, v) - self.evaluate(ua, v)) / (ub - ua);
        let dv = (self.evaluate(u, vb) - self.evaluate(u, va)) / (vb - va);
        let n = du.cross(&dv);
        let len = n.norm();
        if len < 1e-15 {
            return None;
        }
        Some(n / len)
    }

    /// Refines every row so the u knot vector becomes `tau`.
    pub fn refine_u(&self, tau: &KnotVector) -> NurbSurface {
        let extra = tau.difference(&self.u_knots);
        let mut rows_out = Vec::with_capacity(self.rows);
        let mut knots_out = self.u_knots.knots.clone();
        for r in 0..self.rows {
            let mut knots = self.u_knots.knots.clone();
            let mut pts = self.row(r);
            for &u in &extra {
                let (k, p) = insert_knot(self.u_order, &knots, &pts, u);
                knots = k;
                pts = p;
            }
            knots_out = knots;
            rows_out.push(pts);
        }
        let cols = self.cols + extra.len();
        NurbSurface {
            u_order: self.u_order,
            v_order: self.v_order,
            u_knots: KnotVector { knots: knots_out },
            v_knots: self.v_knots.clone(),
            rows: self.rows,
            cols,
            ctl_points: rows_out.into_iter().flatten().collect(),
            rational: self.rational,
        }
    }

    /// Refines every column so the v knot vector becomes `tau`.
    pub fn refine_v(&self, tau: &KnotVector) -> NurbSurface {
        let extra = tau.difference(&self.v_knots);
        let mut cols_out = Vec::with_capacity(self.cols);
        let mut knots_out = self.v_knots.knots.clone();
        for c in 0..self.cols {
            let mut knots = self.v_knots.knots.clone();
            let mut pts = self.column(c);
            for &v in &extra {
                let (k, p) = insert_knot(self.v_order, &knots, &pts, v);
                knots = k;
                pts = p;
            }
            knots_out = knots;
            cols_out.push(pts);
        }
        let rows = self.rows + extra.len();
        let mut ctl_points = Vec::with_capacity(rows * self.cols);
        for r in 0..rows {
            for column in &cols_out {
                ctl_points.push(column[r]);
            }
        }
        NurbSurface {
            u_order: self.u_order,
            v_order: self.v_order,
            u_knots: self.u_knots.clone(),
            v_knots: KnotVector { knots: knots_out },
            rows,
            cols: self.cols,
            ctl_points,
            rational: self.rational,
        }
    }

    /// Bilinear patch through four corners, useful as a minimal surface.
    pub fn bilinear(p00: Point3<f64>, p10: Point3<f64>, p01: Point3<f64>, p11: Point3<f64>) -> Self {
        let h = |p: Point3<f64>| Vector4::new(p.x, p.y, p.z, 1.0);
        NurbSurface {
            u_order: 2,
            v_order: 2,
            u_knots: KnotVector { knots: vec![0.0, 0.0, 1.0, 1.0] },
            v_knots: KnotVector { knots: vec![0.0, 0.0, 1.0, 1.0] },
            rows: 2,
            cols: 2,
            ctl_points: vec![h(p00), h(p10), h(p01), h(p11)],
            rational: false,
        }
    }
}
