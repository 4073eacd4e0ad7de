//! The textured-quad vertex/pixel shader pair shared by `OverlayRenderer`
//! and `PreviewRenderer`'s miniature (spec §4.4 "Rendering", §4.5
//! "Rendering"), plus the solid-color line pipeline the preview uses to draw
//! its viewport-outline indicator. Both quad consumers draw a fullscreen
//! quad that samples a BGRA8 texture through a linear-clamp sampler with
//! `SrcAlpha/InvSrcAlpha` blending. Grounded on the original
//! `overlay_window.cpp`'s embedded HLSL and on the teacher's
//! `Vertex`/bind-group shape in `graphics_context.rs`.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use windows::core::PCSTR;
use windows::Win32::Graphics::Direct3D::Fxc::D3DCompile;
use windows::Win32::Graphics::Direct3D::{ID3DBlob, D3D11_PRIMITIVE_TOPOLOGY_LINESTRIP, D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST};
use windows::Win32::Graphics::Direct3D11::{
    ID3D11BlendState, ID3D11Buffer, ID3D11Device, ID3D11DeviceContext, ID3D11InputLayout,
    ID3D11PixelShader, ID3D11SamplerState, ID3D11ShaderResourceView, ID3D11VertexShader,
    D3D11_APPEND_ALIGNED_ELEMENT, D3D11_BIND_VERTEX_BUFFER, D3D11_BLEND_DESC, D3D11_BLEND_INV_SRC_ALPHA,
    D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD, D3D11_BLEND_SRC_ALPHA, D3D11_BLEND_ZERO, D3D11_BUFFER_DESC,
    D3D11_COLOR_WRITE_ENABLE_ALL, D3D11_COMPARISON_ALWAYS, D3D11_FILTER_MIN_MAG_MIP_LINEAR,
    D3D11_INPUT_ELEMENT_DESC, D3D11_INPUT_PER_VERTEX_DATA, D3D11_RENDER_TARGET_BLEND_DESC,
    D3D11_SAMPLER_DESC, D3D11_SUBRESOURCE_DATA, D3D11_TEXTURE_ADDRESS_CLAMP, D3D11_USAGE_IMMUTABLE,
    D3D11_VIEWPORT,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_R32G32_FLOAT, DXGI_FORMAT_R32G32B32A32_FLOAT};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub texture_coords: [f32; 2],
}

/// Two triangles covering clip space `[-1, 1]^2`, UVs `[0, 1]^2`.
pub const FULLSCREEN_QUAD: [Vertex; 6] = [
    Vertex { position: [-1.0, -1.0], texture_coords: [0.0, 1.0] },
    Vertex { position: [-1.0, 1.0], texture_coords: [0.0, 0.0] },
    Vertex { position: [1.0, 1.0], texture_coords: [1.0, 0.0] },
    Vertex { position: [-1.0, -1.0], texture_coords: [0.0, 1.0] },
    Vertex { position: [1.0, 1.0], texture_coords: [1.0, 0.0] },
    Vertex { position: [1.0, -1.0], texture_coords: [1.0, 1.0] },
];

const VERTEX_SHADER_SRC: &str = r#"
struct VsInput {
    float2 position : POSITION;
    float2 texcoord : TEXCOORD0;
};
struct VsOutput {
    float4 position : SV_POSITION;
    float2 texcoord : TEXCOORD0;
};
VsOutput main(VsInput input) {
    VsOutput output;
    output.position = float4(input.position, 0.0, 1.0);
    output.texcoord = input.texcoord;
    return output;
}
"#;

const PIXEL_SHADER_SRC: &str = r#"
Texture2D shaderTexture : register(t0);
SamplerState samplerState : register(s0);
struct PsInput {
    float4 position : SV_POSITION;
    float2 texcoord : TEXCOORD0;
};
float4 main(PsInput input) : SV_TARGET {
    return shaderTexture.Sample(samplerState, input.texcoord);
}
"#;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader compilation failed: {0}")]
    CompileFailed(windows::core::Error),
    #[error("shader object creation failed: {0}")]
    CreateFailed(windows::core::Error),
}

fn compile(source: &str, entry: &str, target: &str) -> Result<ID3DBlob, ShaderError> {
    let mut blob: Option<ID3DBlob> = None;
    let mut errors: Option<ID3DBlob> = None;
    let entry_c = format!("{entry}\0");
    let target_c = format!("{target}\0");
    let result = unsafe {
        D3DCompile(
            source.as_ptr() as *const _,
            source.len(),
            None,
            None,
            None,
            PCSTR(entry_c.as_ptr()),
            PCSTR(target_c.as_ptr()),
            0,
            0,
            &mut blob,
            Some(&mut errors),
        )
    };
    result.map_err(ShaderError::CompileFailed)?;
    blob.ok_or_else(|| ShaderError::CompileFailed(windows::core::Error::empty()))
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

fn immutable_vertex_buffer(device: &ID3D11Device, bytes: &[u8]) -> Result<ID3D11Buffer, ShaderError> {
    let desc = D3D11_BUFFER_DESC {
        ByteWidth: bytes.len() as u32,
        Usage: D3D11_USAGE_IMMUTABLE,
        BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
        ..Default::default()
    };
    let initial = D3D11_SUBRESOURCE_DATA {
        pSysMem: bytes.as_ptr() as *const _,
        ..Default::default()
    };
    let mut buffer: Option<ID3D11Buffer> = None;
    unsafe { device.CreateBuffer(&desc, Some(&initial), Some(&mut buffer)) }.map_err(ShaderError::CreateFailed)?;
    buffer.ok_or_else(|| ShaderError::CreateFailed(windows::core::Error::empty()))
}

fn linear_clamp_sampler(device: &ID3D11Device) -> Result<ID3D11SamplerState, ShaderError> {
    let desc = D3D11_SAMPLER_DESC {
        Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
        AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
        ComparisonFunc: D3D11_COMPARISON_ALWAYS,
        MaxLOD: f32::MAX,
        ..Default::default()
    };
    let mut sampler: Option<ID3D11SamplerState> = None;
    unsafe { device.CreateSamplerState(&desc, Some(&mut sampler)) }.map_err(ShaderError::CreateFailed)?;
    sampler.ok_or_else(|| ShaderError::CreateFailed(windows::core::Error::empty()))
}

fn straight_alpha_blend(device: &ID3D11Device) -> Result<ID3D11BlendState, ShaderError> {
    let mut desc = D3D11_BLEND_DESC::default();
    desc.RenderTarget[0] = D3D11_RENDER_TARGET_BLEND_DESC {
        BlendEnable: true.into(),
        SrcBlend: D3D11_BLEND_SRC_ALPHA,
        DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
        BlendOp: D3D11_BLEND_OP_ADD,
        SrcBlendAlpha: D3D11_BLEND_ONE,
        DestBlendAlpha: D3D11_BLEND_ZERO,
        BlendOpAlpha: D3D11_BLEND_OP_ADD,
        RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
    };
    let mut state: Option<ID3D11BlendState> = None;
    unsafe { device.CreateBlendState(&desc, Some(&mut state)) }.map_err(ShaderError::CreateFailed)?;
    state.ok_or_else(|| ShaderError::CreateFailed(windows::core::Error::empty()))
}

/// The textured fullscreen quad: samples a captured frame's BGRA8 texture
/// and composites it with straight alpha blending.
pub struct QuadPipeline {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    vertex_buffer: ID3D11Buffer,
    sampler: ID3D11SamplerState,
    blend_state: ID3D11BlendState,
}

impl QuadPipeline {
    /// Compiles the shared vertex/pixel shader pair at runtime via
    /// `D3DCompile`, builds the `{position, texcoord}` input layout, and
    /// creates the immutable vertex buffer plus the sampler/blend state the
    /// draw call needs, matching the original's embedded-HLSL approach (no
    /// offline shader build step).
    pub fn new(device: &ID3D11Device) -> Result<Self, ShaderError> {
        let vs_blob = compile(VERTEX_SHADER_SRC, "main", "vs_5_0")?;
        let ps_blob = compile(PIXEL_SHADER_SRC, "main", "ps_5_0")?;
        let vs_bytes = blob_bytes(&vs_blob);
        let ps_bytes = blob_bytes(&ps_blob);

        let mut vertex_shader: Option<ID3D11VertexShader> = None;
        unsafe { device.CreateVertexShader(vs_bytes, None, Some(&mut vertex_shader)) }
            .map_err(ShaderError::CreateFailed)?;
        let mut pixel_shader: Option<ID3D11PixelShader> = None;
        unsafe { device.CreatePixelShader(ps_bytes, None, Some(&mut pixel_shader)) }
            .map_err(ShaderError::CreateFailed)?;

        let layout_desc = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(b"POSITION\0".as_ptr()),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(b"TEXCOORD\0".as_ptr()),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout: Option<ID3D11InputLayout> = None;
        unsafe { device.CreateInputLayout(&layout_desc, vs_bytes, Some(&mut input_layout)) }
            .map_err(ShaderError::CreateFailed)?;

        let vertex_buffer = immutable_vertex_buffer(device, bytemuck::cast_slice(&FULLSCREEN_QUAD))?;
        let sampler = linear_clamp_sampler(device)?;
        let blend_state = straight_alpha_blend(device)?;

        Ok(Self {
            vertex_shader: vertex_shader.expect("checked by CreateVertexShader success"),
            pixel_shader: pixel_shader.expect("checked by CreatePixelShader success"),
            input_layout: input_layout.expect("checked by CreateInputLayout success"),
            vertex_buffer,
            sampler,
            blend_state,
        })
    }

    /// Binds the pipeline and draws the fullscreen quad sampling `srv` into
    /// whatever render target is currently bound, at `viewport`. Callers set
    /// the render target themselves (it differs between the overlay's and
    /// the preview's swapchain back buffer).
    pub fn draw(&self, context: &ID3D11DeviceContext, srv: &ID3D11ShaderResourceView, viewport: D3D11_VIEWPORT) {
        const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;
        unsafe {
            context.IASetInputLayout(&self.input_layout);
            context.IASetVertexBuffers(0, 1, Some(&Some(self.vertex_buffer.clone())), Some(&STRIDE), Some(&0));
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            context.VSSetShader(&self.vertex_shader, None);
            context.PSSetShader(&self.pixel_shader, None);
            context.PSSetShaderResources(0, Some(&[Some(srv.clone())]));
            context.PSSetSamplers(0, Some(&[Some(self.sampler.clone())]));
            context.OMSetBlendState(&self.blend_state, None, 0xffffffff);
            context.RSSetViewports(Some(&[viewport]));
            context.Draw(FULLSCREEN_QUAD.len() as u32, 0);
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

const LINE_VERTEX_SHADER_SRC: &str = r#"
struct VsInput {
    float2 position : POSITION;
    float4 color : COLOR0;
};
struct VsOutput {
    float4 position : SV_POSITION;
    float4 color : COLOR0;
};
VsOutput main(VsInput input) {
    VsOutput output;
    output.position = float4(input.position, 0.0, 1.0);
    output.color = input.color;
    return output;
}
"#;

const LINE_PIXEL_SHADER_SRC: &str = r#"
struct PsInput {
    float4 position : SV_POSITION;
    float4 color : COLOR0;
};
float4 main(PsInput input) : SV_TARGET {
    return input.color;
}
"#;

/// The solid-colored line-strip pipeline used to draw the preview's
/// viewport-outline indicator (spec §4.5 "Rendering"): a thin rectangle
/// outline over the miniature, traced directly in normalized device
/// coordinates from `ViewportRect`, re-uploaded every frame since the
/// outline moves with the target window.
pub struct LinePipeline {
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    vertex_buffer: ID3D11Buffer,
    capacity: u32,
}

impl LinePipeline {
    pub fn new(device: &ID3D11Device, capacity: u32) -> Result<Self, ShaderError> {
        let vs_blob = compile(LINE_VERTEX_SHADER_SRC, "main", "vs_5_0")?;
        let ps_blob = compile(LINE_PIXEL_SHADER_SRC, "main", "ps_5_0")?;
        let vs_bytes = blob_bytes(&vs_blob);
        let ps_bytes = blob_bytes(&ps_blob);

        let mut vertex_shader: Option<ID3D11VertexShader> = None;
        unsafe { device.CreateVertexShader(vs_bytes, None, Some(&mut vertex_shader)) }
            .map_err(ShaderError::CreateFailed)?;
        let mut pixel_shader: Option<ID3D11PixelShader> = None;
        unsafe { device.CreatePixelShader(ps_bytes, None, Some(&mut pixel_shader)) }
            .map_err(ShaderError::CreateFailed)?;

        let layout_desc = [
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(b"POSITION\0".as_ptr()),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D11_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(b"COLOR\0".as_ptr()),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32A32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: D3D11_APPEND_ALIGNED_ELEMENT,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];
        let mut input_layout: Option<ID3D11InputLayout> = None;
        unsafe { device.CreateInputLayout(&layout_desc, vs_bytes, Some(&mut input_layout)) }
            .map_err(ShaderError::CreateFailed)?;

        let desc = D3D11_BUFFER_DESC {
            ByteWidth: capacity * std::mem::size_of::<ColorVertex>() as u32,
            Usage: windows::Win32::Graphics::Direct3D11::D3D11_USAGE_DYNAMIC,
            BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
            CPUAccessFlags: windows::Win32::Graphics::Direct3D11::D3D11_CPU_ACCESS_WRITE.0 as u32,
            ..Default::default()
        };
        let mut vertex_buffer: Option<ID3D11Buffer> = None;
        unsafe { device.CreateBuffer(&desc, None, Some(&mut vertex_buffer)) }.map_err(ShaderError::CreateFailed)?;

        Ok(Self {
            vertex_shader: vertex_shader.expect("checked by CreateVertexShader success"),
            pixel_shader: pixel_shader.expect("checked by CreatePixelShader success"),
            input_layout: input_layout.expect("checked by CreateInputLayout success"),
            vertex_buffer: vertex_buffer.expect("checked by CreateBuffer success"),
            capacity,
        })
    }

    /// Uploads `vertices` (a closed line strip, normalized device
    /// coordinates) and draws them. `vertices.len()` must not exceed the
    /// capacity this pipeline was created with.
    pub fn draw(&self, context: &ID3D11DeviceContext, vertices: &[ColorVertex], viewport: D3D11_VIEWPORT) {
        debug_assert!(vertices.len() as u32 <= self.capacity);
        unsafe {
            let mut mapped = Default::default();
            if context
                .Map(&self.vertex_buffer, 0, windows::Win32::Graphics::Direct3D11::D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))
                .is_ok()
            {
                std::ptr::copy_nonoverlapping(vertices.as_ptr(), mapped.pData as *mut ColorVertex, vertices.len());
                context.Unmap(&self.vertex_buffer, 0);
            }

            const STRIDE: u32 = std::mem::size_of::<ColorVertex>() as u32;
            context.IASetInputLayout(&self.input_layout);
            context.IASetVertexBuffers(0, 1, Some(&Some(self.vertex_buffer.clone())), Some(&STRIDE), Some(&0));
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_LINESTRIP);
            context.VSSetShader(&self.vertex_shader, None);
            context.PSSetShader(&self.pixel_shader, None);
            context.RSSetViewports(Some(&[viewport]));
            context.Draw(vertices.len() as u32, 0);
        }
    }
}

/// Five points (closed rectangle) in normalized device coordinates `[-1,1]`
/// for a `ViewportRect` given in preview-client pixel coordinates, all
/// sharing `color`.
pub fn viewport_outline_vertices(
    top_left: (f64, f64),
    size: (f64, f64),
    preview_size: (f64, f64),
    color: [f32; 4],
) -> [ColorVertex; 5] {
    let to_ndc = |x: f64, y: f64| -> [f32; 2] {
        [
            (x / preview_size.0 * 2.0 - 1.0) as f32,
            (1.0 - y / preview_size.1 * 2.0) as f32,
        ]
    };
    let (l, t) = top_left;
    let (w, h) = size;
    let corners = [
        to_ndc(l, t),
        to_ndc(l + w, t),
        to_ndc(l + w, t + h),
        to_ndc(l, t + h),
        to_ndc(l, t),
    ];
    [
        ColorVertex { position: corners[0], color },
        ColorVertex { position: corners[1], color },
        ColorVertex { position: corners[2], color },
        ColorVertex { position: corners[3], color },
        ColorVertex { position: corners[4], color },
    ]
}
