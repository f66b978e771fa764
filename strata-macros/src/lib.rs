use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr};

/// Derive macro that turns a plain struct into a typed property set for a layer element.
///
/// Every named field becomes a property addressable by its JSON name. The JSON
/// name defaults to the camelCase form of the field name.
///
/// # Attributes on fields
/// - `#[prop(rename = "name")]` - Use an explicit JSON name
/// - `#[prop(skip)]` - Not a property (internal state, nested property sets)
///
/// The generated setter deserializes the incoming value into the field type and
/// only writes it when it differs from the current value, reporting whether
/// anything changed.
///
/// # Example
/// ```ignore
/// #[derive(Props)]
/// pub struct TextProps {
///     text: String,
///     #[prop(rename = "fontSize")]
///     font_size: Option<String>,
///     #[prop(skip)]
///     measured: bool,
/// }
/// ```
#[proc_macro_derive(Props, attributes(prop))]
pub fn derive_props(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    struct_name,
                    "Props can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(struct_name, "Props can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    // Parse field information
    let mut prop_fields = Vec::new();

    for field in fields {
        let Some(field_name) = field.ident.clone() else {
            continue;
        };

        let mut rename: Option<String> = None;
        let mut skip = false;

        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("prop")) {
            let parsed = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let lit: LitStr = meta.value()?.parse()?;
                    rename = Some(lit.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported prop attribute, expected `skip` or `rename`"))
                }
            });

            if let Err(err) = parsed {
                return err.to_compile_error().into();
            }
        }

        if skip {
            continue;
        }

        let json_name = rename.unwrap_or_else(|| to_camel_case(&field_name.to_string()));
        prop_fields.push(PropField {
            name: field_name,
            json_name,
        });
    }

    let json_names: Vec<&String> = prop_fields.iter().map(|f| &f.json_name).collect();

    // Generate setter arms
    let set_arms = prop_fields.iter().map(|field| {
        let name = &field.name;
        let json_name = &field.json_name;
        quote! {
            #json_name => ::core::option::Option::Some(
                ::strata::elements::props::assign(name, &mut self.#name, value)
            )
        }
    });

    // Generate getter arms
    let get_arms = prop_fields.iter().map(|field| {
        let name = &field.name;
        let json_name = &field.json_name;
        quote! {
            #json_name => ::strata::elements::props::to_value(&self.#name)
        }
    });

    let expanded = quote! {
        impl #impl_generics ::strata::elements::Props for #struct_name #ty_generics #where_clause {
            fn prop_names() -> &'static [&'static str] {
                &[#(#json_names),*]
            }

            fn set_prop(
                &mut self,
                name: &str,
                value: &::strata::elements::props::Value,
            ) -> ::core::option::Option<
                ::core::result::Result<bool, ::strata::elements::PropError>,
            > {
                match name {
                    #(#set_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn get_prop(
                &self,
                name: &str,
            ) -> ::core::option::Option<::strata::elements::props::Value> {
                match name {
                    #(#get_arms,)*
                    _ => ::core::option::Option::None,
                }
            }
        }
    };

    TokenStream::from(expanded)
}

struct PropField {
    name: syn::Ident,
    json_name: String,
}

fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut upper_next = false;

    for c in s.chars() {
        if c == '_' {
            // Leading underscores are dropped along with the separators
            upper_next = !result.is_empty();
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }

    result
}
