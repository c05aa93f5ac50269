use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, FieldsNamed, LitStr};

/// Derive `From<&T> for dom_parts::State`
///
/// Every named field becomes one entry keyed by the field name, its value
/// converted with `Value::from(field.clone())`.
///
/// # Examples
///
/// ```ignore
/// use dom_parts::{IntoState, State};
///
/// #[derive(IntoState)]
/// struct Todo {
///     title: String,
///     done: bool,
///     #[state(rename = "itemsLeft")]
///     items_left: u32,
///     #[state(skip)]
///     id: u64,
/// }
///
/// let state = State::from(&todo);
/// ```
#[proc_macro_derive(IntoState, attributes(state))]
pub fn derive_into_state(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_into_state_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_into_state_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let data = match &input.data {
        Data::Struct(data) => data,
        _ => return Err(syn::Error::new_spanned(input, "IntoState can only be derived for structs")),
    };

    let fields = match &data.fields {
        Fields::Named(fields) => fields,
        Fields::Unnamed(_) => return Err(syn::Error::new_spanned(input, "IntoState requires named fields")),
        Fields::Unit => return Err(syn::Error::new_spanned(input, "IntoState cannot be derived for unit structs")),
    };

    let inserts = generate_inserts(fields)?;

    Ok(quote! {
        impl #impl_generics ::core::convert::From<&#name #ty_generics> for ::dom_parts::State #where_clause {
            fn from(source: &#name #ty_generics) -> Self {
                let mut state = ::dom_parts::State::new();
                #(#inserts)*
                state
            }
        }
    })
}

fn generate_inserts(fields: &FieldsNamed) -> syn::Result<Vec<TokenStream2>> {
    let mut inserts = Vec::new();

    for field in &fields.named {
        let field_name = match &field.ident {
            Some(ident) => ident,
            None => continue,
        };
        let attrs = parse_field_attributes(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let key = attrs.rename.unwrap_or_else(|| field_name.to_string());

        inserts.push(quote! {
            state.insert(#key, ::dom_parts::Value::from(::core::clone::Clone::clone(&source.#field_name)));
        });
    }

    Ok(inserts)
}

#[derive(Default)]
struct FieldAttributes {
    skip: bool,
    rename: Option<String>,
}

fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttributes> {
    let mut result = FieldAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("state") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `skip` or `rename = \"...\"`"))
            }
        })?;
    }

    Ok(result)
}
