// src/renderer/pipeline_builder.rs

/// Assembles one model render pipeline from a program and the blend and
/// raster state bound at draw time.
///
/// Topology, winding and sample count are fixed for model geometry. Blended
/// targets test depth but leave it unwritten.
pub struct ModelPipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    entries: (&'a str, &'a str),
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'a>>,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    cull_mode: Option<wgpu::Face>,
}

impl<'a> ModelPipelineBuilder<'a> {
    /// `entries` names the vertex and fragment entry points of `shader`.
    pub fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        shader: &'a wgpu::ShaderModule,
        entries: (&'a str, &'a str),
        color_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            shader,
            entries,
            vertex_buffers: Vec::new(),
            color_format,
            blend: None,
            depth_format: None,
            cull_mode: Some(wgpu::Face::Back),
        }
    }

    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_vertex_buffer(mut self, layout: wgpu::VertexBufferLayout<'a>) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    pub fn with_blend(mut self, blend: Option<wgpu::BlendState>) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.cull_mode = enabled.then_some(wgpu::Face::Back);
        self
    }

    pub fn with_depth(mut self, format: Option<wgpu::TextureFormat>) -> Self {
        self.depth_format = format;
        self
    }

    fn writes_depth(&self) -> bool {
        self.blend
            .map_or(true, |b| b.color.dst_factor == wgpu::BlendFactor::Zero)
    }

    pub fn build(self) -> wgpu::RenderPipeline {
        let depth_stencil = self.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.writes_depth(),
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        let targets = [Some(wgpu::ColorTargetState {
            format: self.color_format,
            blend: self.blend,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: self.label,
                layout: Some(self.layout),
                vertex: wgpu::VertexState {
                    module: self.shader,
                    entry_point: Some(self.entries.0),
                    buffers: &self.vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: self.shader,
                    entry_point: Some(self.entries.1),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: self.cull_mode,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }
}
