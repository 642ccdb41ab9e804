//! Enumerations shared by controllers, modules, and the recorder.

use std::fmt;

// ── Module kinds ───────────────────────────────────────────────────

/// Physics discipline of a module within a zone.
///
/// The position of a module in its zone's list is its dependency order:
/// the primary discipline comes first, and every secondary is stepped
/// after the disciplines it reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleKind {
    /// Compressible or incompressible mean flow.
    Flow,
    /// Turbulence closure, coupled one level deep to [`ModuleKind::Flow`].
    Turbulence,
    /// Heat conduction, weakly coupled to the flow.
    Heat,
    /// Radiative transfer, weakly coupled to the flow.
    Radiation,
    /// Structural elasticity.
    Structure,
    /// Mesh deformation pseudo-solver.
    MeshDeform,
}

impl ModuleKind {
    /// Stable lowercase name, used in messages and output headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Turbulence => "turbulence",
            Self::Heat => "heat",
            Self::Radiation => "radiation",
            Self::Structure => "structure",
            Self::MeshDeform => "mesh-deform",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Recording kinds ────────────────────────────────────────────────

/// Which variable class is registered as tape input for one adjoint pass.
///
/// The "no recording yet" state is the absence of a kind and is carried
/// as `Option::<RecordingKind>::None` by the recorder, so match arms over
/// this enum never need an unreachable placeholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordingKind {
    /// Solution unknowns plus free design variables.
    SolutionVariables,
    /// Mesh point coordinates.
    MeshCoords,
    /// Solution unknowns, free design variables, and the geometry that
    /// depends on them.
    SolutionAndMesh,
    /// Mesh-deformation unknowns plus boundary-displacement variables.
    MeshDeform,
}

impl RecordingKind {
    /// Stable lowercase name, used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SolutionVariables => "solution-variables",
            Self::MeshCoords => "mesh-coords",
            Self::SolutionAndMesh => "solution-and-mesh",
            Self::MeshDeform => "mesh-deform",
        }
    }

    /// Whether this kind registers solution unknowns and free design
    /// variables as tape inputs.
    pub fn registers_solution(self) -> bool {
        matches!(self, Self::SolutionVariables | Self::SolutionAndMesh)
    }

    /// Whether this kind registers mesh coordinates as tape inputs.
    pub fn registers_coordinates(self) -> bool {
        matches!(self, Self::MeshCoords | Self::MeshDeform)
    }

    /// Whether this kind additionally registers boundary-displacement
    /// design variables.
    pub fn registers_boundary_displacements(self) -> bool {
        matches!(self, Self::MeshDeform)
    }

    /// Whether dependency propagation under this kind must refresh the
    /// mesh geometry and exchange coordinates across ranks.
    pub fn touches_geometry(self) -> bool {
        matches!(self, Self::MeshCoords | Self::SolutionAndMesh)
    }

    /// Stable discriminant used in cross-rank agreement tokens.
    pub fn token(self) -> u64 {
        match self {
            Self::SolutionVariables => 1,
            Self::MeshCoords => 2,
            Self::SolutionAndMesh => 3,
            Self::MeshDeform => 4,
        }
    }
}

impl fmt::Display for RecordingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Time marching ──────────────────────────────────────────────────

/// Time-integration scheme of the outer loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeMarching {
    /// No physical time; the outer loop iterates to a steady state.
    Steady,
    /// First-order implicit dual time stepping (one history level).
    DualTime1st,
    /// Second-order implicit dual time stepping (two history levels).
    DualTime2nd,
}

impl TimeMarching {
    /// Whether the outer loop has no physical time dimension.
    pub fn is_steady(self) -> bool {
        matches!(self, Self::Steady)
    }

    /// Whether dual time stepping is active.
    pub fn is_dual_time(self) -> bool {
        matches!(self, Self::DualTime1st | Self::DualTime2nd)
    }

    /// Number of retained history levels beyond the current solution.
    pub fn history_levels(self) -> usize {
        match self {
            Self::Steady => 0,
            Self::DualTime1st => 1,
            Self::DualTime2nd => 2,
        }
    }
}

impl fmt::Display for TimeMarching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Steady => "steady",
            Self::DualTime1st => "dual-time-1st",
            Self::DualTime2nd => "dual-time-2nd",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Recording-kind dispatch table ──────────────────────────

    #[test]
    fn solution_kinds_register_solution() {
        assert!(RecordingKind::SolutionVariables.registers_solution());
        assert!(RecordingKind::SolutionAndMesh.registers_solution());
        assert!(!RecordingKind::MeshCoords.registers_solution());
        assert!(!RecordingKind::MeshDeform.registers_solution());
    }

    #[test]
    fn mesh_kinds_register_coordinates() {
        assert!(RecordingKind::MeshCoords.registers_coordinates());
        assert!(RecordingKind::MeshDeform.registers_coordinates());
        assert!(!RecordingKind::SolutionVariables.registers_coordinates());
        assert!(!RecordingKind::SolutionAndMesh.registers_coordinates());
    }

    #[test]
    fn only_mesh_deform_registers_boundary_displacements() {
        assert!(RecordingKind::MeshDeform.registers_boundary_displacements());
        assert!(!RecordingKind::MeshCoords.registers_boundary_displacements());
        assert!(!RecordingKind::SolutionVariables.registers_boundary_displacements());
    }

    #[test]
    fn geometry_refresh_kinds() {
        assert!(RecordingKind::MeshCoords.touches_geometry());
        assert!(RecordingKind::SolutionAndMesh.touches_geometry());
        assert!(!RecordingKind::SolutionVariables.touches_geometry());
        assert!(!RecordingKind::MeshDeform.touches_geometry());
    }

    #[test]
    fn tokens_are_distinct() {
        let tokens = [
            RecordingKind::SolutionVariables.token(),
            RecordingKind::MeshCoords.token(),
            RecordingKind::SolutionAndMesh.token(),
            RecordingKind::MeshDeform.token(),
        ];
        for (i, a) in tokens.iter().enumerate() {
            for b in &tokens[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    // ── Time marching ──────────────────────────────────────────

    #[test]
    fn history_levels_per_scheme() {
        assert_eq!(TimeMarching::Steady.history_levels(), 0);
        assert_eq!(TimeMarching::DualTime1st.history_levels(), 1);
        assert_eq!(TimeMarching::DualTime2nd.history_levels(), 2);
    }

    #[test]
    fn steady_is_not_dual_time() {
        assert!(TimeMarching::Steady.is_steady());
        assert!(!TimeMarching::Steady.is_dual_time());
        assert!(TimeMarching::DualTime1st.is_dual_time());
        assert!(TimeMarching::DualTime2nd.is_dual_time());
    }
}
