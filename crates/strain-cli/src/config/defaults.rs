pub struct DefaultsConfig {
    pub structure: &'static str,
    pub deformation_gradients: bool,
    pub strain_tensors: bool,
    pub push_forward: bool,
    pub csv: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            structure: "bcc",
            deformation_gradients: true,
            strain_tensors: true,
            push_forward: false,
            csv: true,
        }
    }
}
