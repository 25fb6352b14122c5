/// User entity, reduced to what access control needs: brand membership and
/// at most one role reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub brand_id: String,
    pub role_id: Option<String>,
}

impl User {
    /// Assigns a role, replacing any previous assignment.
    pub fn assign_role(&mut self, role_id: String) {
        self.role_id = Some(role_id);
    }

    pub fn clear_role(&mut self) {
        self.role_id = None;
    }

    pub fn belongs_to(&self, brand_id: &str) -> bool {
        self.brand_id == brand_id
    }
}
